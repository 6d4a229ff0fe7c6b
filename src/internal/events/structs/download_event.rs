use std::sync::Arc;

use crate::internal::entity::structs::DownloadEntity;
use crate::internal::transfer::structs::TransferError;

use super::download_action::DownloadAction;

/// 投递给监听者的事件。每个监听者拿到的都是独立的拷贝。
#[derive(Debug, Clone)]
pub struct DownloadEvent {
    pub action: DownloadAction,
    /// 实体标识（源 URL）
    pub entity_id: String,
    /// 事件对应的字节偏移；`PreDownload` 与 `Cancel` 不携带
    pub offset: Option<u64>,
    /// 总大小，未知时为 -1
    pub total_size: i64,
    /// 事件发生时的实体快照
    pub entity: DownloadEntity,
    /// `Fail` 事件携带的原因
    pub error: Option<Arc<TransferError>>,
}

impl DownloadEvent {
    pub(crate) fn new(action: DownloadAction, offset: Option<u64>, entity: DownloadEntity) -> Self {
        Self {
            action,
            entity_id: entity.url.clone(),
            offset,
            total_size: entity.file_size,
            entity,
            error: None,
        }
    }

    pub(crate) fn with_error(mut self, error: Arc<TransferError>) -> Self {
        self.error = Some(error);
        self
    }
}
