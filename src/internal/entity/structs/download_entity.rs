use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::download_state::DownloadState;

/// 文件大小未知时的取值。
pub const UNKNOWN_SIZE: i64 = -1;

/// 下载实体：以源 URL 为唯一标识，记录目标路径、大小、进度与状态。
///
/// 不变式：
/// - 大小已知时 `current_progress <= file_size`
/// - `download_complete == (state == DownloadState::Complete)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadEntity {
    /// 源地址，同时是实体的唯一键
    pub url: String,
    /// 下载目标文件路径
    pub file_path: PathBuf,
    /// 文件总大小（字节），未知时为 [`UNKNOWN_SIZE`]
    pub file_size: i64,
    /// 当前已写入的字节偏移
    pub current_progress: u64,
    pub state: DownloadState,
    /// 是否已完成；与 `state` 冗余，单独持久化便于快速查询
    pub download_complete: bool,
    /// 最近一次变更时间
    pub last_modified: DateTime<Utc>,
}

impl DownloadEntity {
    pub fn new(url: impl Into<String>, file_path: impl AsRef<Path>) -> Self {
        Self {
            url: url.into(),
            file_path: file_path.as_ref().to_path_buf(),
            file_size: UNKNOWN_SIZE,
            current_progress: 0,
            state: DownloadState::Idle,
            download_complete: false,
            last_modified: Utc::now(),
        }
    }

    /// 实体标识（即源 URL）。
    pub fn id(&self) -> &str {
        &self.url
    }

    /// 总大小是否已知。
    pub fn size_known(&self) -> bool {
        self.file_size >= 0
    }

    /// 进度百分比（0～100）；大小未知或为 0 时返回 `None`。
    pub fn percent(&self) -> Option<f64> {
        if self.file_size <= 0 {
            return None;
        }
        Some(self.current_progress as f64 / self.file_size as f64 * 100.0)
    }

    /// 切换状态并同步完成标记与修改时间。
    pub(crate) fn set_state(&mut self, state: DownloadState) {
        self.state = state;
        self.download_complete = state == DownloadState::Complete;
        self.touch();
    }

    pub(crate) fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}
