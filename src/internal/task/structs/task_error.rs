use thiserror::Error;

use crate::internal::store::structs::StoreError;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("URL 无效: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("不支持的协议: {0}（仅支持 http/https）")]
    UnsupportedScheme(String),

    #[error("未在 tokio 运行时中构建任务: {0}")]
    Runtime(#[source] tokio::runtime::TryCurrentError),

    #[error("创建 HTTP 客户端失败: {0}")]
    Client(#[source] reqwest::Error),

    #[error("实体存储失败: {0}")]
    Store(#[from] StoreError),

    #[error("任务正在下载中: {0}")]
    AlreadyDownloading(String),

    #[error("任务已完成: {0}")]
    AlreadyComplete(String),
}
