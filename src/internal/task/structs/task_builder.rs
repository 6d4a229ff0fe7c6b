//! 下载任务构建器：绑定实体、HTTP 客户端、存储与监听者。

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use url::Url;

use crate::internal::entity::impl_traits::MemoryEntityStore;
use crate::internal::entity::structs::{DownloadEntity, DownloadState};
use crate::internal::entity::traits::EntityStore;
use crate::internal::events::structs::{
    ChannelListener, DownloadEvent, EventDispatcher, FnListener, StateChangeListener,
};
use crate::internal::events::traits::DownloadListener;
use crate::internal::states::unlock_reactive::UnlockReactiveProperty;
use crate::internal::store::structs::ConfigStore;
use crate::internal::transfer::structs::{DownloadEngine, DownloadEngineParams, EngineConfig};

use super::download_task::DownloadTask;
use super::task_error::TaskError;

/// [`DownloadTask`] 构建器，各项均有默认值：
///
/// - 客户端：`reqwest::Client::builder().build()`
/// - 续传记录目录：[`ConfigStore::default_dir`]
/// - 实体存储：进程内 [`MemoryEntityStore`]
/// - 监听者：无（事件只更新并持久化实体）
pub struct DownloadTaskBuilder {
    entity: DownloadEntity,
    client: Option<Client>,
    config: EngineConfig,
    config_store: Option<ConfigStore>,
    entity_store: Option<Arc<dyn EntityStore>>,
    listeners: Vec<Arc<dyn DownloadListener>>,
}

impl DownloadTaskBuilder {
    pub fn new(entity: DownloadEntity) -> Self {
        Self {
            entity,
            client: None,
            config: EngineConfig::default(),
            config_store: None,
            entity_store: None,
            listeners: Vec::new(),
        }
    }

    /// 使用调用方的 HTTP 客户端（TLS、认证、超时都由它负责）。
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// 每次写盘的最大字节数，同时是响应停止/取消的粒度。
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size.max(1);
        self
    }

    /// 进度事件对外转发的最小间隔（字节）。
    pub fn progress_interval(mut self, interval: u64) -> Self {
        self.config.progress_interval = interval;
        self
    }

    /// 续传记录所在目录。
    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_store = Some(ConfigStore::new(dir.into()));
        self
    }

    pub fn config_store(mut self, store: ConfigStore) -> Self {
        self.config_store = Some(store);
        self
    }

    pub fn entity_store(mut self, store: Arc<dyn EntityStore>) -> Self {
        self.entity_store = Some(store);
        self
    }

    /// 添加一个监听者；可多次调用，按添加顺序依次收到事件。
    pub fn listener(mut self, listener: impl DownloadListener + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// 以闭包接收全部事件。
    pub fn on_event<F>(self, f: F) -> Self
    where
        F: Fn(DownloadEvent) + Send + Sync + 'static,
    {
        self.listener(FnListener(f))
    }

    /// 以通道接收全部事件（含节流后的进度）。
    pub fn notify_channel(self, sender: UnboundedSender<DownloadEvent>) -> Self {
        self.listener(ChannelListener::new(sender))
    }

    /// 以通道只接收状态变更事件。
    pub fn state_channel(self, sender: UnboundedSender<DownloadEvent>) -> Self {
        self.listener(StateChangeListener::new(sender))
    }

    /// 校验 URL，加载或新建实体记录，组装任务。传输任务派发到调用 `build` 的运行时。
    ///
    /// 存储里已有同一 URL 的记录时以它为准，便于进程重启后继续；
    /// 记录停留在 Downloading（上次进程中途退出）时按 Stopped 处理。
    pub async fn build(self) -> Result<DownloadTask, TaskError> {
        let parsed = Url::parse(&self.entity.url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TaskError::UnsupportedScheme(parsed.scheme().to_string()));
        }

        let runtime = Handle::try_current().map_err(TaskError::Runtime)?;

        let entity_store = self
            .entity_store
            .unwrap_or_else(|| Arc::new(MemoryEntityStore::new()));

        let existing = entity_store.read(&self.entity.url).await?;
        let entity = match existing {
            Some(mut saved) => {
                log::debug!("载入已有实体: {} ({:?})", saved.url, saved.state);
                if saved.state == DownloadState::Downloading {
                    saved.set_state(DownloadState::Stopped);
                    entity_store.update(&saved).await?;
                }
                saved
            }
            None => {
                entity_store.create(&self.entity).await?;
                self.entity
            }
        };

        let client = match self.client {
            Some(client) => client,
            None => Client::builder().build().map_err(TaskError::Client)?,
        };

        let entity_prop = UnlockReactiveProperty::new(entity.clone());
        let dispatcher = Arc::new(EventDispatcher::new(
            entity_prop.clone(),
            entity_store,
            self.listeners,
            self.config.progress_interval,
        ));
        let engine = Arc::new(DownloadEngine::new(DownloadEngineParams {
            runtime,
            client,
            url: entity.url.clone(),
            file_path: entity.file_path.clone(),
            config_store: self.config_store.unwrap_or_default(),
            config: self.config,
        }));

        Ok(DownloadTask::from_parts(engine, dispatcher, entity_prop))
    }
}
