//! # UnlockReactiveProperty
//!
//! 轻量级响应式属性，读写都不等待锁，适合高频更新的实体快照。
//!
//! ## 使用示例
//! ```rust,no_run
//! use resume_dl::states::unlock_reactive::UnlockReactiveProperty;
//!
//! let prop = UnlockReactiveProperty::new(0u64);
//! prop.update(1);
//! prop.update_field(|v| *v += 1);
//! assert_eq!(prop.get_current(), 2);
//! ```

pub use super::reactive_core::{PropertyWatcher, ReactivePropertyError as UnlockReactivePropertyError};

/// 轻量级响应式属性容器（无条件等待能力）。
///
/// 需要「等到某个状态」的场景请使用
/// [`LockReactiveProperty`](super::lock_reactive::LockReactiveProperty)。
pub type UnlockReactiveProperty<T> = super::reactive_core::ReactiveProperty<T>;
