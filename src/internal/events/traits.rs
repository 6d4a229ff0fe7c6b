pub mod download_listener;

pub use download_listener::DownloadListener;
