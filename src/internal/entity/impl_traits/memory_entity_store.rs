use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::internal::entity::structs::DownloadEntity;
use crate::internal::entity::traits::EntityStore;
use crate::internal::store::structs::StoreError;

/// 进程内实体存储；未指定存储时的默认实现。
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    records: Mutex<HashMap<String, DownloadEntity>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn create(&self, entity: &DownloadEntity) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        if records.contains_key(&entity.url) {
            return Err(StoreError::AlreadyExists(entity.url.clone()));
        }
        records.insert(entity.url.clone(), entity.clone());
        Ok(())
    }

    async fn read(&self, url: &str) -> Result<Option<DownloadEntity>, StoreError> {
        Ok(self.records.lock().await.get(url).cloned())
    }

    async fn update(&self, entity: &DownloadEntity) -> Result<(), StoreError> {
        self.records
            .lock()
            .await
            .insert(entity.url.clone(), entity.clone());
        Ok(())
    }

    async fn delete(&self, url: &str) -> Result<(), StoreError> {
        self.records.lock().await.remove(url);
        Ok(())
    }
}
