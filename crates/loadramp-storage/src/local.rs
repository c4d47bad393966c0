//! Local filesystem run store
//!
//! Each run is one `<key>.json` file in a base directory. Listing reads the
//! directory and strips the extension.

use crate::store::RunStore;
use async_trait::async_trait;
use bytes::Bytes;
use loadramp_core::{CoreError, CoreResult};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Extension appended to every key on disk.
pub const RUN_FILE_EXTENSION: &str = ".json";

/// Local filesystem run store
pub struct LocalRunStore {
    base_dir: PathBuf,
}

impl LocalRunStore {
    /// Create a new local run store
    ///
    /// Creates the base directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::IoError` if directory creation fails
    pub async fn new(base_dir: impl AsRef<Path>) -> CoreResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// File name a key is stored under.
    pub fn file_name(key: &str) -> String {
        format!("{}{}", key, RUN_FILE_EXTENSION)
    }

    /// Full path of the file holding `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(Self::file_name(key))
    }
}

#[async_trait]
impl RunStore for LocalRunStore {
    async fn get(&self, key: &str) -> CoreResult<Bytes> {
        self.validate_key(key)?;

        let data = tokio::fs::read(self.path_for(key)).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::not_found("run", key)
            } else {
                CoreError::from(e)
            }
        })?;

        Ok(Bytes::from(data))
    }

    async fn keys(&self) -> CoreResult<BTreeSet<String>> {
        let unable_to_list = |e: std::io::Error| {
            CoreError::UnableToList(format!("{}: {}", self.base_dir.display(), e))
        };

        let mut keys = BTreeSet::new();
        let mut read_dir = tokio::fs::read_dir(&self.base_dir)
            .await
            .map_err(unable_to_list)?;

        while let Some(entry) = read_dir.next_entry().await.map_err(unable_to_list)? {
            let file_type = entry.file_type().await.map_err(unable_to_list)?;
            if file_type.is_dir() {
                continue;
            }

            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if let Some(key) = name.strip_suffix(RUN_FILE_EXTENSION) {
                if !key.is_empty() {
                    keys.insert(key.to_string());
                }
            }
        }

        Ok(keys)
    }

    async fn set(&self, key: &str, data: Bytes) -> CoreResult<usize> {
        self.validate_key(key)?;

        tokio::fs::write(self.path_for(key), &data)
            .await
            .map_err(|e| CoreError::write_failed(key, e.to_string()))?;

        Ok(data.len())
    }

    /// Keys must name a single file inside the base directory.
    fn validate_key(&self, key: &str) -> CoreResult<()> {
        if key.is_empty() {
            return Err(CoreError::ValidationError(
                "Key cannot be empty".to_string(),
            ));
        }
        if key.contains(|c: char| c == '/' || c == '\\') || key.starts_with('.') {
            return Err(CoreError::ValidationError(format!(
                "Key `{}` must not contain path separators or start with '.'",
                key
            )));
        }
        Ok(())
    }
}
