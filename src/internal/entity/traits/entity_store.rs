//! 实体持久化契约：核心只依赖按标识增删改查，不关心存储介质。

use async_trait::async_trait;

use crate::internal::entity::structs::DownloadEntity;
use crate::internal::store::structs::StoreError;

/// 下载实体的持久化存储。标识为实体的源 URL。
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// 新建记录；同标识已存在时返回 [`StoreError::AlreadyExists`]。
    async fn create(&self, entity: &DownloadEntity) -> Result<(), StoreError>;

    /// 读取记录；不存在时返回 `Ok(None)`。
    async fn read(&self, url: &str) -> Result<Option<DownloadEntity>, StoreError>;

    /// 写回记录（不存在时新建）。
    async fn update(&self, entity: &DownloadEntity) -> Result<(), StoreError>;

    /// 删除记录；不存在视为成功。
    async fn delete(&self, url: &str) -> Result<(), StoreError>;
}
