//! 下载任务：对外的 start / stop / cancel 入口，持有一个实体和一个引擎。

use std::sync::Arc;

use crate::internal::entity::structs::{DownloadEntity, DownloadState};
use crate::internal::events::structs::EventDispatcher;
use crate::internal::states::unlock_reactive::{PropertyWatcher, UnlockReactiveProperty};
use crate::internal::transfer::structs::DownloadEngine;

use super::task_builder::DownloadTaskBuilder;
use super::task_error::TaskError;

/// 单个 URL 的下载任务。
///
/// 同一任务任何时刻至多一个传输在跑；所有方法都可以在任意线程/任务上并发调用。
pub struct DownloadTask {
    engine: Arc<DownloadEngine>,
    dispatcher: Arc<EventDispatcher>,
    entity: UnlockReactiveProperty<DownloadEntity>,
}

impl DownloadTask {
    /// 以实体创建构建器。
    pub fn builder(entity: DownloadEntity) -> DownloadTaskBuilder {
        DownloadTaskBuilder::new(entity)
    }

    pub(crate) fn from_parts(
        engine: Arc<DownloadEngine>,
        dispatcher: Arc<EventDispatcher>,
        entity: UnlockReactiveProperty<DownloadEntity>,
    ) -> Self {
        Self {
            engine,
            dispatcher,
            entity,
        }
    }

    /// 启动下载，立即返回；后台传输开始时返回 `Ok`。
    ///
    /// 已在下载时返回 [`TaskError::AlreadyDownloading`]，已完成时返回
    /// [`TaskError::AlreadyComplete`]。
    pub fn try_start(&self) -> Result<(), TaskError> {
        if self.entity.map(|e| e.state == DownloadState::Complete) {
            return Err(TaskError::AlreadyComplete(self.url()));
        }
        if !self.engine.start(Arc::clone(&self.dispatcher)) {
            return Err(TaskError::AlreadyDownloading(self.url()));
        }
        Ok(())
    }

    /// 启动下载；拒绝时只记日志。返回是否真正启动了一次传输。
    pub fn start(&self) -> bool {
        match self.try_start() {
            Ok(()) => true,
            Err(e) => {
                log::info!("忽略启动请求: {}", e);
                false
            }
        }
    }

    /// 停止下载并等待传输退出；部分文件与续传记录保留。未在下载时什么也不做。
    pub async fn stop(&self) {
        self.engine.request_stop();
        self.engine.wait_idle().await;
    }

    /// 取消下载：正在下载时先等传输退出，然后不论此前处于什么状态，
    /// 删除续传记录、目标文件与实体记录（各步独立，失败只记日志）。
    ///
    /// 保证恰好发出一次取消事件。
    pub async fn cancel(&self) {
        self.engine.request_cancel();
        self.engine.wait_idle().await;

        if let Err(e) = self.engine.del_config_file().await {
            log::warn!("删除续传记录失败: {}", e);
        }
        if let Err(e) = self.engine.del_temp_file().await {
            log::warn!("删除目标文件失败: {}: {}", self.engine.file_path().display(), e);
        }
        self.dispatcher.on_cancel().await;
    }

    /// 是否有传输正在进行。
    pub fn is_downloading(&self) -> bool {
        self.engine.is_downloading()
    }

    /// 实体快照。
    pub fn entity(&self) -> DownloadEntity {
        self.entity.get_current()
    }

    /// 监听实体快照的变化。
    pub fn watch_entity(&self) -> PropertyWatcher<DownloadEntity> {
        self.entity.watch()
    }

    /// 等待当前传输尝试结束（完成、停止、取消或失败）。
    pub async fn wait_idle(&self) {
        self.engine.wait_idle().await;
    }

    pub fn url(&self) -> String {
        self.engine.url().to_string()
    }
}
