pub mod download_engine;
pub mod engine_config;
pub mod engine_status;
pub mod progress_tracker;
pub mod transfer_connection;
pub mod transfer_error;
pub mod transfer_outcome;

pub use download_engine::{DownloadEngine, DownloadEngineParams};
pub use engine_config::{DEFAULT_CHUNK_SIZE, DEFAULT_PROGRESS_INTERVAL, EngineConfig};
pub use engine_status::EngineStatus;
pub use progress_tracker::{ProgressThrottle, ProgressTracker};
pub use transfer_connection::{ByteStream, ContentRange, TransferConnection, range_header};
pub use transfer_error::{FailureKind, TransferError};
pub use transfer_outcome::{CopyExit, SettleParams, TransferOutcome};
