//! # LockReactiveProperty
//!
//! 带条件等待能力的响应式属性容器，基于 `std::sync::Mutex` + `tokio::sync::Notify` 实现。
//!
//! ## 与 UnlockReactiveProperty 的区别
//! - `UnlockReactiveProperty`：纯通知机制，适合实体快照这类高频更新。
//! - `LockReactiveProperty`：互斥锁保证强一致性，提供原子的「检查并切换」
//!   [`transition`](LockReactiveProperty::transition)，`wait_until` 不会错过满足条件的时刻。
//!
//! 锁只在同步代码里短暂持有，从不跨越 `.await`，因此同步方法可以在任意线程直接调用。
//!
//! ## 使用示例
//! ```rust,no_run
//! use resume_dl::states::lock_reactive::LockReactiveProperty;
//!
//! #[derive(Clone, PartialEq)]
//! enum Phase { Idle, Running }
//!
//! # async fn example() {
//! let prop = LockReactiveProperty::new(Phase::Idle);
//! assert!(prop.transition(|p| *p == Phase::Idle, Phase::Running));
//! assert!(!prop.transition(|p| *p == Phase::Idle, Phase::Running));
//!
//! let p = prop.clone();
//! tokio::spawn(async move { p.update(Phase::Idle) });
//! prop.wait_until(|p| *p == Phase::Idle).await;
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

#[derive(Debug)]
struct Inner<T> {
    value: Mutex<T>,
    notify: Notify,
}

/// 带条件等待能力的响应式属性容器。
#[derive(Clone, Debug)]
pub struct LockReactiveProperty<T: Clone + Send + Sync> {
    inner: Arc<Inner<T>>,
}

impl<T> LockReactiveProperty<T>
where
    T: Clone + Send + Sync,
{
    /// 创建一个新的带条件等待能力的响应式属性。
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: Mutex::new(value),
                notify: Notify::new(),
            }),
        }
    }

    // 持锁期间不会 panic，中毒时直接取回内部值
    fn guard(&self) -> MutexGuard<'_, T> {
        self.inner
            .value
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 更新属性值并唤醒所有等待者。
    pub fn update(&self, new_value: T) {
        *self.guard() = new_value;
        self.inner.notify.notify_waiters();
    }

    /// 获取当前值的克隆。
    pub fn get_current(&self) -> T {
        self.guard().clone()
    }

    /// 原子地检查并切换：当前值满足 `predicate` 时写入 `new_value` 并返回 `true`，
    /// 否则保持不变返回 `false`。检查与写入在同一把锁内完成。
    pub fn transition<F>(&self, predicate: F, new_value: T) -> bool
    where
        F: FnOnce(&T) -> bool,
    {
        let mut guard = self.guard();
        if !predicate(&guard) {
            return false;
        }
        *guard = new_value;
        drop(guard);
        self.inner.notify.notify_waiters();
        true
    }

    /// 异步等待直到值满足指定条件；当前值已满足时立即返回。
    ///
    /// 先注册通知再检查条件，检查与等待之间的更新不会丢失。
    pub async fn wait_until<F>(&self, mut predicate: F)
    where
        F: FnMut(&T) -> bool,
    {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if predicate(&self.guard()) {
                return;
            }

            notified.await;
        }
    }
}
