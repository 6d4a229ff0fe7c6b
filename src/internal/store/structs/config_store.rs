//! 续传配置的旁路文件存储：`<dir>/<sha256(url)>.json`。

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::internal::utils::identity_key;

use super::resume_config::ResumeConfig;
use super::store_error::StoreError;

/// 默认目录名（位于系统缓存目录下）。
const DEFAULT_DIR_NAME: &str = "resume_dl";

/// 续传配置存储。位置只由 URL 决定，进程重启后可直接找到。
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

impl ConfigStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// 系统缓存目录下的 `resume_dl/configs`，取不到缓存目录时退回当前目录。
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .map(|d| d.join(DEFAULT_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(format!(".{}", DEFAULT_DIR_NAME)))
            .join("configs")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 该 URL 对应的旁路文件路径。
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.json", identity_key(url)))
    }

    /// 读取配置；文件不存在时返回 `Ok(None)`。
    pub async fn load(&self, url: &str) -> Result<Option<ResumeConfig>, StoreError> {
        let path = self.path_for(url);
        let data = match fs::read_to_string(&path).await {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        let config: ResumeConfig = serde_json::from_str(&data)?;
        // 哈希碰撞或手工改动过的文件不予采信
        if config.url != url {
            log::warn!("旁路配置的 URL 不匹配，忽略: {}", path.display());
            return Ok(None);
        }
        Ok(Some(config))
    }

    /// 写入配置（覆盖）。先写临时文件再改名，中途崩溃不会留下半截 JSON。
    pub async fn save(&self, config: &ResumeConfig) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::CreateDir {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.path_for(&config.url);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec(config)?;
        fs::write(&tmp, json)
            .await
            .map_err(|source| StoreError::Write {
                path: tmp.clone(),
                source,
            })?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|source| StoreError::Write { path, source })
    }

    /// 删除配置；文件本就不存在视为成功。
    pub async fn delete(&self, url: &str) -> Result<(), StoreError> {
        let path = self.path_for(url);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Remove { path, source }),
        }
    }

    /// 配置文件是否存在。
    pub async fn exists(&self, url: &str) -> bool {
        fs::try_exists(self.path_for(url)).await.unwrap_or(false)
    }
}
