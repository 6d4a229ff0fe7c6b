//! 事件分发：把引擎报告的生命周期节点翻译成实体状态，持久化后转发给监听者。

use std::sync::{Arc, Mutex, MutexGuard};

use crate::internal::entity::structs::{DownloadEntity, DownloadState};
use crate::internal::entity::traits::EntityStore;
use crate::internal::events::traits::DownloadListener;
use crate::internal::states::unlock_reactive::UnlockReactiveProperty;
use crate::internal::transfer::structs::{ProgressThrottle, TransferError};

use super::download_action::DownloadAction;
use super::download_event::DownloadEvent;

/// 事件分发器。
///
/// 每个事件：更新实体快照 → 尽力持久化（失败只记日志）→ 按注册顺序转发拷贝。
/// 进度事件经过节流，其余事件总是转发。
pub struct EventDispatcher {
    entity: UnlockReactiveProperty<DownloadEntity>,
    store: Arc<dyn EntityStore>,
    listeners: Vec<Arc<dyn DownloadListener>>,
    throttle: Mutex<ProgressThrottle>,
}

impl EventDispatcher {
    pub fn new(
        entity: UnlockReactiveProperty<DownloadEntity>,
        store: Arc<dyn EntityStore>,
        listeners: Vec<Arc<dyn DownloadListener>>,
        progress_interval: u64,
    ) -> Self {
        Self {
            entity,
            store,
            listeners,
            throttle: Mutex::new(ProgressThrottle::new(progress_interval)),
        }
    }

    /// 当前实体快照。
    pub fn entity(&self) -> DownloadEntity {
        self.entity.get_current()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// 新的总大小小于已记录的进度时（续传被拒且文件变短），进度归零，
    /// 保持 `current_progress <= file_size`。
    pub async fn on_pre_download(&self, total_size: i64) {
        self.entity.update_field(|e| {
            if total_size >= 0 && e.current_progress > total_size as u64 {
                e.current_progress = 0;
            }
            e.file_size = total_size;
            e.set_state(DownloadState::Downloading);
        });
        self.persist().await;
        self.forward(DownloadEvent::new(DownloadAction::PreDownload, None, self.entity()))
            .await;
    }

    pub async fn on_resume(&self, offset: u64) {
        self.throttle().reset(offset);
        self.entity.update_field(|e| {
            e.current_progress = offset;
            e.set_state(DownloadState::Downloading);
        });
        self.persist().await;
        self.forward(DownloadEvent::new(DownloadAction::Resume, Some(offset), self.entity()))
            .await;
    }

    pub async fn on_start(&self, offset: u64) {
        self.throttle().reset(offset);
        self.entity.update_field(|e| {
            e.current_progress = offset;
            e.set_state(DownloadState::Downloading);
        });
        self.persist().await;
        self.forward(DownloadEvent::new(DownloadAction::Start, Some(offset), self.entity()))
            .await;
    }

    /// 快照总是更新；只有超过节流间隔才持久化并转发。
    pub async fn on_progress(&self, offset: u64) {
        self.entity.update_field(|e| e.current_progress = offset);
        let emit = self.throttle().should_emit(offset);
        if !emit {
            return;
        }
        self.entity.update_field(|e| e.touch());
        self.persist().await;
        self.forward(DownloadEvent::new(DownloadAction::Running, Some(offset), self.entity()))
            .await;
    }

    pub async fn on_stop(&self, offset: u64) {
        self.entity.update_field(|e| {
            e.current_progress = offset;
            e.set_state(DownloadState::Stopped);
        });
        self.persist().await;
        self.forward(DownloadEvent::new(DownloadAction::Stop, Some(offset), self.entity()))
            .await;
    }

    /// 切到 Cancelled 并转发，随后删除实体记录。已是 Cancelled 时不重复转发。
    pub async fn on_cancel(&self) {
        let mut changed = false;
        self.entity.update_field(|e| {
            if e.state != DownloadState::Cancelled {
                changed = true;
                e.current_progress = 0;
                e.set_state(DownloadState::Cancelled);
            }
        });
        if changed {
            self.forward(DownloadEvent::new(DownloadAction::Cancel, None, self.entity()))
                .await;
        }
        self.discard_record().await;
    }

    /// 先补发一次被节流掉的最终进度，再报告完成。
    pub async fn on_complete(&self) {
        let offset = self.entity.map(|e| e.current_progress);
        let pending = {
            let mut throttle = self.throttle();
            let pending = throttle.last_emitted() != offset;
            throttle.mark(offset);
            pending
        };
        if pending {
            self.forward(DownloadEvent::new(DownloadAction::Running, Some(offset), self.entity()))
                .await;
        }

        self.entity.update_field(|e| {
            if e.file_size < 0 {
                e.file_size = offset as i64;
            }
            e.set_state(DownloadState::Complete);
        });
        self.persist().await;
        self.forward(DownloadEvent::new(DownloadAction::Complete, Some(offset), self.entity()))
            .await;
    }

    pub async fn on_fail(&self, error: TransferError) {
        self.entity.update_field(|e| e.set_state(DownloadState::Failed));
        self.persist().await;
        let entity = self.entity();
        let event = DownloadEvent::new(DownloadAction::Fail, Some(entity.current_progress), entity)
            .with_error(Arc::new(error));
        self.forward(event).await;
    }

    /// 删除实体记录，失败只记日志。
    pub async fn discard_record(&self) {
        let url = self.entity.map(|e| e.url.clone());
        if let Err(e) = self.store.delete(&url).await {
            log::warn!("删除实体记录失败: {}: {}", url, e);
        }
    }

    async fn persist(&self) {
        let snapshot = self.entity();
        if let Err(e) = self.store.update(&snapshot).await {
            log::warn!("持久化实体失败: {}: {}", snapshot.url, e);
        }
    }

    async fn forward(&self, event: DownloadEvent) {
        for listener in &self.listeners {
            listener.on_event(event.clone()).await;
        }
    }

    // 锁内不 await，中毒时直接取回
    fn throttle(&self) -> MutexGuard<'_, ProgressThrottle> {
        self.throttle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
