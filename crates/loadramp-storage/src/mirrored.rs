//! Filesystem run store with an asynchronous object-store mirror.
//!
//! Reads and listings are served from the local directory. Every write lands
//! on disk first; the same bytes are then uploaded in a detached task under
//! the run's file name. Mirror failures are logged and never reach the caller.

use crate::local::LocalRunStore;
use crate::object_store::ObjectStore;
use crate::store::RunStore;
use async_trait::async_trait;
use bytes::Bytes;
use loadramp_core::CoreResult;
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct MirroredRunStore {
    local: LocalRunStore,
    mirror: Arc<dyn ObjectStore>,
}

impl MirroredRunStore {
    pub fn new(local: LocalRunStore, mirror: Arc<dyn ObjectStore>) -> Self {
        Self { local, mirror }
    }

    pub fn local(&self) -> &LocalRunStore {
        &self.local
    }
}

#[async_trait]
impl RunStore for MirroredRunStore {
    async fn get(&self, key: &str) -> CoreResult<Bytes> {
        self.local.get(key).await
    }

    async fn keys(&self) -> CoreResult<BTreeSet<String>> {
        self.local.keys().await
    }

    fn validate_key(&self, key: &str) -> CoreResult<()> {
        self.local.validate_key(key)
    }

    async fn set(&self, key: &str, data: Bytes) -> CoreResult<usize> {
        let written = self.local.set(key, data.clone()).await?;

        let mirror = Arc::clone(&self.mirror);
        let object_key = LocalRunStore::file_name(key);
        tokio::spawn(async move {
            match mirror.put(&object_key, data).await {
                Ok(()) => tracing::debug!(key = %object_key, "run mirrored"),
                Err(e) => tracing::warn!(key = %object_key, "Run mirror upload failed: {}", e),
            }
        });

        Ok(written)
    }
}
