//! 持久化相关错误类型。

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("创建目录失败 {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("读取记录失败 {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("写入记录失败 {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("删除记录失败 {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("记录格式错误: {0}")]
    Format(#[from] serde_json::Error),

    #[error("记录已存在: {0}")]
    AlreadyExists(String),
}
