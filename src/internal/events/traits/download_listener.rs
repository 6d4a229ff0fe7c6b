//! 事件监听接口：由分发器按注册顺序逐个调用。

use async_trait::async_trait;

use crate::internal::events::structs::DownloadEvent;

/// 下载事件监听者。
///
/// 使用方式二选一（可混用）：
/// - **闭包 / 通道**：用构建器的 `on_event` / `notify_channel` / `state_channel`；
/// - **完整监听者**：实现本 trait，通过构建器的 `listener` 注册。
///
/// 实现不应长时间阻塞，分发器会等它返回后再调用下一个监听者。
#[async_trait]
pub trait DownloadListener: Send + Sync {
    async fn on_event(&self, event: DownloadEvent);
}
