//! Remote object storage used as a mirror for filesystem run stores.
//!
//! Backends:
//! - AWS S3 and S3-compatible endpoints (MinIO, Wasabi)
//! - In-memory mock with optional failures (testing)

mod mock;
mod s3;

pub use mock::MockObjectStore;
pub use s3::{S3Config, S3ObjectStore};

use async_trait::async_trait;
use bytes::Bytes;
use loadramp_core::CoreResult;

/// S3-like object store.
///
/// All implementations must be thread-safe (Send + Sync). Keys are UTF-8
/// strings treated as opaque identifiers.
///
/// # Error Handling
///
/// - `CoreError::StorageError` - Backend-specific error (network, permissions, etc.)
/// - `CoreError::ValidationError` - Empty key
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Put object (overwrites if exists)
    async fn put(&self, key: &str, data: Bytes) -> CoreResult<()>;
}
