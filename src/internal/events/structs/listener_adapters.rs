//! 监听者适配器：把闭包或通道包装成 [`DownloadListener`]。

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::internal::events::structs::DownloadEvent;
use crate::internal::events::traits::DownloadListener;

/// 闭包监听者，供 `on_event` 使用。
pub(crate) struct FnListener<F>(pub(crate) F);

#[async_trait]
impl<F> DownloadListener for FnListener<F>
where
    F: Fn(DownloadEvent) + Send + Sync + 'static,
{
    async fn on_event(&self, event: DownloadEvent) {
        (self.0)(event);
    }
}

/// 转发全部事件到通道；接收端已关闭时静默丢弃。
pub struct ChannelListener {
    sender: UnboundedSender<DownloadEvent>,
}

impl ChannelListener {
    pub fn new(sender: UnboundedSender<DownloadEvent>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl DownloadListener for ChannelListener {
    async fn on_event(&self, event: DownloadEvent) {
        let _ = self.sender.send(event);
    }
}

/// 只转发状态变更事件（开始、停止、取消、完成、失败）。
pub struct StateChangeListener {
    sender: UnboundedSender<DownloadEvent>,
}

impl StateChangeListener {
    pub fn new(sender: UnboundedSender<DownloadEvent>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl DownloadListener for StateChangeListener {
    async fn on_event(&self, event: DownloadEvent) {
        if event.action.is_state_change() {
            let _ = self.sender.send(event);
        }
    }
}
