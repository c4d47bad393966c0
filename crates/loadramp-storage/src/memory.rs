//! In-memory run store. Contents live for the lifetime of the process.

use crate::store::RunStore;
use async_trait::async_trait;
use bytes::Bytes;
use loadramp_core::{CoreError, CoreResult};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

/// Run store backed by a lock-protected map.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: RwLock<HashMap<String, Bytes>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.read().is_empty()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn get(&self, key: &str) -> CoreResult<Bytes> {
        self.runs
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| CoreError::not_found("run", key))
    }

    async fn keys(&self) -> CoreResult<BTreeSet<String>> {
        Ok(self.runs.read().keys().cloned().collect())
    }

    async fn set(&self, key: &str, data: Bytes) -> CoreResult<usize> {
        self.validate_key(key)?;

        let written = data.len();
        self.runs.write().insert(key.to_string(), data);
        Ok(written)
    }
}
