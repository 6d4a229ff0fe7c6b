//! 文件实体存储：每个实体一个 JSON 文件，文件名为 URL 的 SHA-256。

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::internal::entity::structs::DownloadEntity;
use crate::internal::entity::traits::EntityStore;
use crate::internal::store::structs::StoreError;
use crate::internal::utils::identity_key;

#[derive(Debug, Clone)]
pub struct JsonEntityStore {
    dir: PathBuf,
}

impl JsonEntityStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.entity.json", identity_key(url)))
    }

    async fn write(&self, entity: &DownloadEntity) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::CreateDir {
                path: self.dir.clone(),
                source,
            })?;
        let path = self.path_for(&entity.url);
        let json = serde_json::to_vec_pretty(entity)?;
        fs::write(&path, json)
            .await
            .map_err(|source| StoreError::Write { path, source })
    }
}

#[async_trait]
impl EntityStore for JsonEntityStore {
    async fn create(&self, entity: &DownloadEntity) -> Result<(), StoreError> {
        if fs::try_exists(self.path_for(&entity.url))
            .await
            .unwrap_or(false)
        {
            return Err(StoreError::AlreadyExists(entity.url.clone()));
        }
        self.write(entity).await
    }

    async fn read(&self, url: &str) -> Result<Option<DownloadEntity>, StoreError> {
        let path = self.path_for(url);
        let data = match fs::read(&path).await {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    async fn update(&self, entity: &DownloadEntity) -> Result<(), StoreError> {
        self.write(entity).await
    }

    async fn delete(&self, url: &str) -> Result<(), StoreError> {
        let path = self.path_for(url);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Remove { path, source }),
        }
    }
}
