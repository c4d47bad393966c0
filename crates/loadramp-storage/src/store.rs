//! Run store abstraction: the key-value contract under which run results
//! are persisted, and the backend selection used at start-up.

use crate::local::LocalRunStore;
use crate::memory::MemoryRunStore;
use crate::mirrored::MirroredRunStore;
use crate::object_store::{S3Config, S3ObjectStore};
use async_trait::async_trait;
use bytes::Bytes;
use loadramp_core::{CoreError, CoreResult};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Key-value store for serialized run results.
///
/// Keys are run names. Backends may decorate keys (a file extension, an
/// object prefix) but always hand back the bare name from [`RunStore::keys`].
///
/// # Error Handling
///
/// - `CoreError::NotFound` - `get` on an absent key
/// - `CoreError::IoError` - any other read failure
/// - `CoreError::UnableToList` - the backend cannot be enumerated
/// - `CoreError::WriteFailed` - the backend rejected a write
/// - `CoreError::ValidationError` - the key cannot be stored by this backend
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> CoreResult<Bytes>;

    /// Every stored key. An empty backend yields an empty set.
    async fn keys(&self) -> CoreResult<BTreeSet<String>>;

    /// Store `data` under `key`, replacing any previous value.
    ///
    /// Returns the number of bytes written.
    async fn set(&self, key: &str, data: Bytes) -> CoreResult<usize>;

    /// Check that `key` can be stored by this backend, without touching it.
    ///
    /// `set` fails with the same `CoreError::ValidationError` for any key
    /// rejected here.
    fn validate_key(&self, key: &str) -> CoreResult<()> {
        if key.is_empty() {
            return Err(CoreError::ValidationError(
                "Key cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Store backend chosen at start-up.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    /// Process-lifetime map.
    Memory,
    /// One JSON file per run under `path`.
    Filesystem { path: PathBuf },
    /// Filesystem store mirrored asynchronously to S3.
    Mirrored { path: PathBuf, s3: S3Config },
}

impl StoreBackend {
    /// Short backend name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Filesystem { .. } => "filesystem",
            StoreBackend::Mirrored { .. } => "mirrored",
        }
    }
}

/// Build the store described by `backend`.
pub async fn open_store(backend: &StoreBackend) -> CoreResult<Arc<dyn RunStore>> {
    let store: Arc<dyn RunStore> = match backend {
        StoreBackend::Memory => Arc::new(MemoryRunStore::new()),
        StoreBackend::Filesystem { path } => Arc::new(LocalRunStore::new(path).await?),
        StoreBackend::Mirrored { path, s3 } => {
            let local = LocalRunStore::new(path).await?;
            let mirror = S3ObjectStore::new(s3.clone()).await?;
            Arc::new(MirroredRunStore::new(local, Arc::new(mirror)))
        }
    };

    tracing::info!(backend = backend.kind(), "run store opened");
    Ok(store)
}
