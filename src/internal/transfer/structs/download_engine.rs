//! 单文件可续传下载引擎：读取续传记录、建立连接、分块写盘、按结局收尾。

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Client;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::runtime::Handle;

use crate::internal::events::structs::EventDispatcher;
use crate::internal::states::lock_reactive::LockReactiveProperty;
use crate::internal::store::structs::{ConfigStore, ResumeConfig, StoreError};

use super::engine_config::EngineConfig;
use super::engine_status::EngineStatus;
use super::progress_tracker::ProgressTracker;
use super::transfer_connection::TransferConnection;
use super::transfer_error::TransferError;
use super::transfer_outcome::{CopyExit, SettleParams, TransferOutcome};

/// 构造引擎的参数（形参超过 3 个，用 struct 承载）。
pub struct DownloadEngineParams {
    /// 传输任务运行所在的运行时；`start` 可以在运行时之外的线程上调用
    pub runtime: Handle,
    pub client: Client,
    pub url: String,
    pub file_path: PathBuf,
    pub config_store: ConfigStore,
    pub config: EngineConfig,
}

/// 传输任务结束（包括 panic 展开）时把状态放回 Idle。
struct IdleGuard<'a>(&'a LockReactiveProperty<EngineStatus>);

impl Drop for IdleGuard<'_> {
    fn drop(&mut self) {
        self.0.update(EngineStatus::Idle);
    }
}

#[derive(Debug)]
pub struct DownloadEngine {
    runtime: Handle,
    client: Client,
    url: String,
    file_path: PathBuf,
    config_store: ConfigStore,
    config: EngineConfig,
    status: LockReactiveProperty<EngineStatus>,
}

/// 外部接口
impl DownloadEngine {
    pub fn new(params: DownloadEngineParams) -> Self {
        Self {
            runtime: params.runtime,
            client: params.client,
            url: params.url,
            file_path: params.file_path,
            config_store: params.config_store,
            config: params.config,
            status: LockReactiveProperty::new(EngineStatus::Idle),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn status(&self) -> EngineStatus {
        self.status.get_current()
    }

    /// 有传输尝试尚未结束（包括正在响应停止/取消）。
    pub fn is_downloading(&self) -> bool {
        self.status.get_current().is_active()
    }

    /// Idle 时原子地切到 Running 并在后台启动一次传输，立即返回。
    ///
    /// 已有传输在跑时返回 `false`，并发调用只有一个会成功。
    /// 任务派发到构建时记下的运行时，调用方不必处在运行时上下文中。
    pub fn start(self: &Arc<Self>, dispatcher: Arc<EventDispatcher>) -> bool {
        if !self
            .status
            .transition(|s| *s == EngineStatus::Idle, EngineStatus::Running)
        {
            return false;
        }

        let engine = Arc::clone(self);
        self.runtime.spawn(async move {
            let _idle = IdleGuard(&engine.status);
            let outcome = engine.transfer(&dispatcher).await;
            engine.finish(outcome, &dispatcher).await;
        });
        true
    }

    /// 请求停止；只有 Running 能进入 Stopping。返回请求是否生效。
    pub fn request_stop(&self) -> bool {
        self.status
            .transition(|s| *s == EngineStatus::Running, EngineStatus::Stopping)
    }

    /// 请求取消；Running 与 Stopping 都能升级为 Cancelling。返回请求是否生效。
    pub fn request_cancel(&self) -> bool {
        self.status.transition(
            |s| matches!(s, EngineStatus::Running | EngineStatus::Stopping),
            EngineStatus::Cancelling,
        )
    }

    /// 等待当前传输尝试结束；没有传输时立即返回。
    pub async fn wait_idle(&self) {
        self.status.wait_until(|s| *s == EngineStatus::Idle).await;
    }

    /// 删除续传记录。
    pub async fn del_config_file(&self) -> Result<(), StoreError> {
        self.config_store.delete(&self.url).await
    }

    /// 删除目标文件，文件不存在视为成功。
    pub async fn del_temp_file(&self) -> std::io::Result<()> {
        match tokio::fs::remove_file(&self.file_path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// 内部实现
impl DownloadEngine {
    async fn transfer(&self, dispatcher: &EventDispatcher) -> TransferOutcome {
        let offset = self.resume_offset().await;

        let connected = tokio::select! {
            biased;
            _ = self.status.wait_until(EngineStatus::is_interrupting) => {
                return self.interrupted_before_copy(offset, dispatcher);
            }
            connected = self.connect(offset) => connected,
        };
        let connection = match connected {
            Ok(connection) => connection,
            Err(error) => {
                return TransferOutcome::Failed {
                    error,
                    offset: None,
                    total_size: dispatcher.entity().file_size,
                };
            }
        };

        let resumed = connection.honors_range();
        let start_at = if resumed { offset } else { 0 };
        if offset > 0 && !resumed {
            log::info!(
                "服务器未按区间响应 (状态码 {}), 从头下载: {}",
                connection.status(),
                self.url
            );
        }

        let total_size = connection.total_size();
        dispatcher.on_pre_download(total_size).await;
        self.save_config(start_at, total_size).await;

        let mut file = match self.open_file(start_at).await {
            Ok(file) => file,
            Err(error) => {
                return TransferOutcome::Failed {
                    error,
                    offset: None,
                    total_size,
                };
            }
        };

        if resumed {
            dispatcher.on_resume(start_at).await;
        } else {
            dispatcher.on_start(0).await;
        }

        let mut tracker = ProgressTracker::new(connection.into_stream(), start_at);
        let exit = self
            .copy_loop(&mut file, &mut tracker, total_size, dispatcher)
            .await;
        let flushed = file.flush().await;
        drop(file);

        let offset = tracker.offset();
        log::debug!(
            "传输结束: {} 本次接收 {} 字节, 偏移 {}",
            self.url,
            tracker.received(),
            offset
        );

        let on_disk = match &flushed {
            Ok(()) => None,
            Err(e) => {
                log::warn!("刷新文件失败, 以磁盘实际长度为续传点: {}", e);
                tokio::fs::metadata(&self.file_path)
                    .await
                    .ok()
                    .map(|meta| meta.len())
            }
        };

        TransferOutcome::settle(SettleParams {
            exit,
            flushed,
            offset,
            on_disk,
            total_size,
            cancelling: self.status.get_current() == EngineStatus::Cancelling,
        })
    }

    /// 连接建立前就收到停止/取消：续传记录保持不变。
    fn interrupted_before_copy(&self, offset: u64, dispatcher: &EventDispatcher) -> TransferOutcome {
        match self.status.get_current() {
            EngineStatus::Cancelling => TransferOutcome::Cancelled,
            _ => TransferOutcome::Stopped {
                offset,
                total_size: dispatcher.entity().file_size,
            },
        }
    }

    /// 读取续传记录，只有本地文件长度与记录一致时才采信。
    async fn resume_offset(&self) -> u64 {
        let saved = match self.config_store.load(&self.url).await {
            Ok(Some(saved)) if saved.offset > 0 => saved,
            Ok(_) => return 0,
            Err(e) => {
                log::warn!("读取续传记录失败, 从头下载: {}", e);
                return 0;
            }
        };

        match tokio::fs::metadata(&self.file_path).await {
            Ok(meta) if meta.len() == saved.offset => {
                log::info!("从 {} 字节处续传: {}", saved.offset, self.url);
                saved.offset
            }
            Ok(meta) => {
                log::warn!(
                    "本地文件长度 {} 与续传记录 {} 不一致, 从头下载: {}",
                    meta.len(),
                    saved.offset,
                    self.url
                );
                0
            }
            Err(e) => {
                log::warn!("本地文件不可用 ({}), 从头下载: {}", e, self.url);
                0
            }
        }
    }

    /// 建立连接；区间被拒绝或起点不符时放弃续传，改发普通 GET。
    async fn connect(&self, offset: u64) -> Result<TransferConnection, TransferError> {
        match TransferConnection::open(&self.client, &self.url, offset).await {
            Err(e @ (TransferError::RangeNotSatisfiable | TransferError::RangeMismatch { .. }))
                if offset > 0 =>
            {
                log::warn!("{}, 从头下载: {}", e, self.url);
                TransferConnection::open(&self.client, &self.url, 0).await
            }
            other => other,
        }
    }

    /// 续传时定位到 `start_at` 追加写，否则截断重建。
    async fn open_file(&self, start_at: u64) -> Result<File, TransferError> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(TransferError::OpenFile)?;
            }
        }

        if start_at == 0 {
            return File::create(&self.file_path)
                .await
                .map_err(TransferError::OpenFile);
        }

        let mut file = OpenOptions::new()
            .write(true)
            .open(&self.file_path)
            .await
            .map_err(TransferError::OpenFile)?;
        file.set_len(start_at)
            .await
            .map_err(TransferError::WriteFile)?;
        file.seek(SeekFrom::Start(start_at))
            .await
            .map_err(TransferError::SeekFile)?;
        Ok(file)
    }

    async fn copy_loop(
        &self,
        file: &mut File,
        tracker: &mut ProgressTracker,
        total_size: i64,
        dispatcher: &EventDispatcher,
    ) -> CopyExit {
        let slice_len = self.config.chunk_size.max(1);

        loop {
            let next = tokio::select! {
                biased;
                _ = self.status.wait_until(EngineStatus::is_interrupting) => {
                    return CopyExit::Interrupted;
                }
                next = tracker.next_chunk() => next,
            };

            let chunk = match next {
                None => return CopyExit::Eof,
                Some(Err(e)) => return CopyExit::Failed(TransferError::Read(e)),
                Some(Ok(chunk)) => chunk,
            };

            for slice in chunk.chunks(slice_len) {
                let len = slice.len() as u64;
                if total_size >= 0 && tracker.offset() + len > total_size as u64 {
                    return CopyExit::Failed(TransferError::BodyOverflow {
                        expected: total_size as u64,
                    });
                }
                if let Err(e) = file.write_all(slice).await {
                    return CopyExit::Failed(TransferError::WriteFile(e));
                }

                let offset = tracker.advance(len);
                dispatcher.on_progress(offset).await;

                if self.status.get_current().is_interrupting() {
                    return CopyExit::Interrupted;
                }
            }
        }
    }

    /// 按结局写/删续传记录，再发出对应事件。
    async fn finish(&self, outcome: TransferOutcome, dispatcher: &EventDispatcher) {
        match outcome {
            TransferOutcome::Completed { offset } => {
                self.remove_config().await;
                log::info!("下载完成: {} ({} 字节)", self.url, offset);
                dispatcher.on_complete().await;
            }
            TransferOutcome::Stopped { offset, total_size } => {
                self.save_config(offset, total_size).await;
                log::info!("下载已停止于 {} 字节: {}", offset, self.url);
                dispatcher.on_stop(offset).await;
            }
            TransferOutcome::Cancelled => {
                self.remove_config().await;
                if let Err(e) = self.del_temp_file().await {
                    log::warn!("删除目标文件失败: {}", e);
                }
                log::info!("下载已取消: {}", self.url);
                dispatcher.on_cancel().await;
            }
            TransferOutcome::Failed {
                error,
                offset,
                total_size,
            } => {
                if let Some(offset) = offset {
                    self.save_config(offset, total_size).await;
                }
                log::error!("下载失败: {}: {}", self.url, error);
                dispatcher.on_fail(error).await;
            }
        }
    }

    async fn save_config(&self, offset: u64, total_size: i64) {
        let config = ResumeConfig::new(self.url.clone(), offset, total_size);
        if let Err(e) = self.config_store.save(&config).await {
            log::warn!("写入续传记录失败: {}", e);
        }
    }

    async fn remove_config(&self) {
        if let Err(e) = self.del_config_file().await {
            log::warn!("删除续传记录失败: {}", e);
        }
    }
}
