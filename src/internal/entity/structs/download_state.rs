use serde::{Deserialize, Serialize};

/// 下载实体的生命周期状态。
///
/// `Idle → Downloading → {Stopped, Cancelled, Complete, Failed}`；
/// `Stopped / Cancelled / Failed` 可以重新进入 `Downloading`，`Complete` 为终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DownloadState {
    #[default]
    Idle,
    Downloading,
    Stopped,
    Cancelled,
    Complete,
    Failed,
}

impl DownloadState {
    /// 是否允许从该状态发起一次新的传输。
    pub fn can_start(&self) -> bool {
        !matches!(self, DownloadState::Downloading | DownloadState::Complete)
    }

    /// 是否保留了可续传的进度（部分文件 + 旁路配置）。
    pub fn is_resumable(&self) -> bool {
        matches!(self, DownloadState::Stopped | DownloadState::Failed)
    }

    /// 传输已结束、不会再有后续事件的状态。
    pub fn is_settled(&self) -> bool {
        !matches!(self, DownloadState::Idle | DownloadState::Downloading)
    }
}
