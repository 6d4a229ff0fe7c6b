pub mod entity;
pub mod events;
pub mod states;
pub mod store;
pub mod task;
pub mod transfer;
pub mod utils;
