//! Mock ObjectStore for testing
//!
//! In-memory object storage that can be told to fail every upload, used to
//! exercise mirror behaviour without AWS or MinIO.
//!
//! # Examples
//!
//! ```rust
//! use loadramp_storage::object_store::{MockObjectStore, ObjectStore};
//! use bytes::Bytes;
//!
//! # async fn example() -> loadramp_core::CoreResult<()> {
//! let mock = MockObjectStore::new();
//! mock.put("key1", Bytes::from("data1")).await?;
//! assert!(mock.contains_key("key1"));
//!
//! let failing = MockObjectStore::new_always_fail("503 Service Unavailable");
//! assert!(failing.put("key2", Bytes::from("data2")).await.is_err());
//! assert_eq!(failing.failed_puts(), 1);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::ObjectStore;
use loadramp_core::{CoreError, CoreResult};

/// In-memory ObjectStore counting its uploads.
#[derive(Default)]
pub struct MockObjectStore {
    objects: RwLock<HashMap<String, Bytes>>,
    always_fail: Option<&'static str>,
    successful_puts: AtomicUsize,
    failed_puts: AtomicUsize,
}

impl MockObjectStore {
    /// Create new mock that accepts every upload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create mock whose every upload fails with `error`.
    pub fn new_always_fail(error: &'static str) -> Self {
        Self {
            always_fail: Some(error),
            ..Self::default()
        }
    }

    /// Number of successful puts.
    pub fn successful_puts(&self) -> usize {
        self.successful_puts.load(Ordering::SeqCst)
    }

    /// Number of failed puts.
    pub fn failed_puts(&self) -> usize {
        self.failed_puts.load(Ordering::SeqCst)
    }

    /// Every put attempted so far.
    pub fn put_calls(&self) -> usize {
        self.successful_puts() + self.failed_puts()
    }

    /// Check if key exists in storage.
    pub fn contains_key(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put(&self, key: &str, data: Bytes) -> CoreResult<()> {
        if key.is_empty() {
            return Err(CoreError::ValidationError(
                "Key cannot be empty".to_string(),
            ));
        }

        if let Some(msg) = self.always_fail {
            self.failed_puts.fetch_add(1, Ordering::SeqCst);
            return Err(CoreError::StorageError(format!("Permanent: {}", msg)));
        }

        self.objects.write().insert(key.to_string(), data);
        self.successful_puts.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }
}
