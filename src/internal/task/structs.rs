pub mod download_task;
pub mod task_builder;
pub mod task_error;

pub use download_task::DownloadTask;
pub use task_builder::DownloadTaskBuilder;
pub use task_error::TaskError;
