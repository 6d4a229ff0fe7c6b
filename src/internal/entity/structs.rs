pub mod download_entity;
pub mod download_state;

pub use download_entity::{DownloadEntity, UNKNOWN_SIZE};
pub use download_state::DownloadState;
