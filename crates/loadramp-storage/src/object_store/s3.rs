//! AWS S3 implementation of ObjectStore
//!
//! Supports standard AWS S3 and S3-compatible endpoints (MinIO, Wasabi, etc.).

use super::ObjectStore;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{config::Credentials, primitives::ByteStream, Client, Config};
use bytes::Bytes;
use loadramp_core::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// S3 configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,
    /// AWS region (e.g., "us-west-2")
    pub region: String,
    /// Optional custom endpoint URL (for MinIO compatibility)
    pub endpoint: Option<String>,
    /// Optional access key (for custom S3 endpoints)
    pub access_key: Option<String>,
    /// Optional secret key (for custom S3 endpoints)
    pub secret_key: Option<String>,
    /// Optional key prefix (all keys will be prefixed with this)
    ///
    /// Example: "runs/" will store "smoke.json" as "runs/smoke.json"
    pub prefix: Option<String>,
}

impl S3Config {
    /// Create config for standard AWS S3 (uses environment credentials)
    pub fn aws(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            prefix: None,
        }
    }

    /// Create config for MinIO or custom S3-compatible endpoint
    pub fn custom(
        bucket: impl Into<String>,
        region: impl Into<String>,
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            endpoint: Some(endpoint.into()),
            access_key: Some(access_key.into()),
            secret_key: Some(secret_key.into()),
            prefix: None,
        }
    }

    /// Set optional key prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Key an object is stored under once the prefix is applied
    pub fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) if !prefix.trim_end_matches('/').is_empty() => {
                format!("{}/{}", prefix.trim_end_matches('/'), key)
            }
            _ => key.to_string(),
        }
    }
}

/// AWS S3 object store
pub struct S3ObjectStore {
    client: Client,
    config: S3Config,
}

impl S3ObjectStore {
    /// Create a new S3 object store
    ///
    /// Static credentials are used when endpoint, access key and secret key
    /// are all set; otherwise credentials come from the environment.
    pub async fn new(config: S3Config) -> CoreResult<Self> {
        if config.bucket.is_empty() {
            return Err(CoreError::ValidationError(
                "S3 bucket cannot be empty".to_string(),
            ));
        }

        let client = if let (Some(endpoint), Some(access), Some(secret)) =
            (&config.endpoint, &config.access_key, &config.secret_key)
        {
            let creds = Credentials::new(access, secret, None, None, "loadramp-static");

            let s3_config = Config::builder()
                .endpoint_url(endpoint)
                .credentials_provider(creds)
                .region(aws_sdk_s3::config::Region::new(config.region.clone()))
                .force_path_style(true) // Required for MinIO
                .behavior_version(BehaviorVersion::latest())
                .build();

            Client::from_conf(s3_config)
        } else {
            let aws_config = aws_config::defaults(BehaviorVersion::latest())
                .region(aws_config::Region::new(config.region.clone()))
                .load()
                .await;

            Client::new(&aws_config)
        };

        Ok(Self { client, config })
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, data: Bytes) -> CoreResult<()> {
        if key.is_empty() {
            return Err(CoreError::ValidationError(
                "Key cannot be empty".to_string(),
            ));
        }

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(self.config.full_key(key))
            .content_type("application/json")
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| CoreError::StorageError(format!("S3 put failed: {}", e)))?;

        Ok(())
    }
}
