pub mod config_store;
pub mod resume_config;
pub mod store_error;

pub use config_store::ConfigStore;
pub use resume_config::ResumeConfig;
pub use store_error::StoreError;
