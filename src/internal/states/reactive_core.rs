//! # ReactiveProperty — 响应式属性内核
//!
//! 基于 [`tokio::sync::watch`] 的值容器：写入方整体替换或原地修改，读取方拿快照或异步监听。
//! 下载实体的快照就放在这里，任务侧与事件分发侧共享同一份。

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

// ──────────────────────────── Error ────────────────────────────

/// 响应式属性统一错误类型
#[derive(Debug, Error)]
pub enum ReactivePropertyError {
    /// 监听器已失效（属性所有者全部释放）
    #[error("监听器已被销毁")]
    WatcherClosed,
}

// ──────────────────────────── ReactiveProperty ────────────────────────────

/// 响应式属性内核：new / update / update_field / get_current / watch。
#[derive(Clone, Debug)]
pub struct ReactiveProperty<T: Clone + Send + Sync> {
    sender: Arc<watch::Sender<T>>,
}

impl<T> ReactiveProperty<T>
where
    T: Clone + Send + Sync,
{
    /// 创建一个新的响应式属性。
    pub fn new(value: T) -> Self {
        let (sender, _) = watch::channel(value);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// 整体替换当前值，所有监听者都会收到通知。
    pub fn update(&self, new_value: T) {
        self.sender.send_replace(new_value);
    }

    /// 使用闭包原地修改当前值。
    ///
    /// 修改在 watch 内部锁中完成，并发调用之间不会互相覆盖。
    pub fn update_field<F>(&self, updater: F)
    where
        F: FnOnce(&mut T),
    {
        self.sender.send_modify(updater);
    }

    /// 获取当前值的快照（会 clone）。
    pub fn get_current(&self) -> T {
        self.sender.borrow().clone()
    }

    /// 对当前值应用只读函数，避免整份 clone。
    pub fn map<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.sender.borrow())
    }

    /// 创建一个监听器，用于异步监听属性值的变化。
    pub fn watch(&self) -> PropertyWatcher<T> {
        PropertyWatcher {
            receiver: self.sender.subscribe(),
        }
    }
}

// ──────────────────────────── PropertyWatcher ────────────────────────────

/// 属性监听器，用于异步接收属性值的变化。
pub struct PropertyWatcher<T> {
    receiver: watch::Receiver<T>,
}

impl<T> PropertyWatcher<T>
where
    T: Clone + Send + Sync,
{
    /// 异步等待属性值的变化，返回新值；属性已被全部释放时返回
    /// [`ReactivePropertyError::WatcherClosed`]。
    pub async fn changed(&mut self) -> Result<T, ReactivePropertyError> {
        self.receiver
            .changed()
            .await
            .map_err(|_| ReactivePropertyError::WatcherClosed)?;
        Ok(self.receiver.borrow_and_update().clone())
    }

    /// 同步获取当前值的克隆。
    pub fn borrow(&self) -> T {
        self.receiver.borrow().clone()
    }
}
