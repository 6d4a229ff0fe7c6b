pub mod lock_reactive;
pub mod reactive_core;
pub mod unlock_reactive;
