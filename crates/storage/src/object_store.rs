//! Object storage interface for the remote forecast archive (S3 compatible).

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::{aws::AmazonS3Builder, path::Path as ObjectPath, ObjectStore};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use forecast_common::{ForecastError, ForecastResult};

/// Remote object namespace consumed by the resolver and the cache.
///
/// The bucket is bound when the client is built, so operations take keys only.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Metadata-only existence check. "Not found" is `Ok(false)`;
    /// any other failure is an error.
    async fn head(&self, key: &str) -> ForecastResult<bool>;

    /// Fetch the full object into `local_path`, returning the bytes written.
    async fn download(&self, key: &str, local_path: &Path) -> ForecastResult<u64>;

    /// Fetch a small object into memory.
    async fn get(&self, key: &str) -> ForecastResult<Bytes>;

    fn bucket(&self) -> &str;

    /// Provenance URI for a key.
    fn uri(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket(), key)
    }
}

/// Configuration for object storage connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// Bucket name
    pub bucket: String,
    /// AWS region of the bucket
    pub region: String,
    /// Endpoint override for S3-compatible mirrors
    pub endpoint: Option<String>,
    /// Send unsigned requests (public buckets)
    pub skip_signature: bool,
    /// Allow plain HTTP endpoints
    pub allow_http: bool,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            bucket: "noaa-hrrr-bdp-pds".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            skip_signature: true,
            allow_http: false,
        }
    }
}

/// Object storage client for the forecast archive.
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStorage {
    /// Create a new S3 client from config.
    pub fn new(config: &ObjectStorageConfig) -> ForecastResult<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_skip_signature(config.skip_signature);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| ForecastError::InvalidConfig(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            bucket: config.bucket.clone(),
        })
    }

    /// Wrap an existing store (e.g. `object_store::memory::InMemory` in tests).
    pub fn from_store(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Write bytes to a key in the bucket.
    #[instrument(skip(self, data), fields(bucket = %self.bucket, key = %key))]
    pub async fn put(&self, key: &str, data: Bytes) -> ForecastResult<()> {
        let location = ObjectPath::from(key);
        debug!(size = data.len(), "Writing object");

        self.store
            .put(&location, data.into())
            .await
            .map_err(|e| ForecastError::Transfer(format!("Failed to write {}: {}", key, e)))?;

        Ok(())
    }
}

#[async_trait]
impl RemoteStore for ObjectStorage {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn head(&self, key: &str) -> ForecastResult<bool> {
        let location = ObjectPath::from(key);

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(ForecastError::Transfer(format!(
                "Failed to check {}: {}",
                key, e
            ))),
        }
    }

    #[instrument(skip(self, local_path), fields(bucket = %self.bucket, path = %local_path.display()))]
    async fn download(&self, key: &str, local_path: &Path) -> ForecastResult<u64> {
        let location = ObjectPath::from(key);

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| read_error(key, e))?;
        let expected = result.meta.size as u64;

        let mut file = tokio::fs::File::create(local_path).await?;
        let mut stream = result.into_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                ForecastError::Transfer(format!("Error reading {} after {} bytes: {}", key, written, e))
            })?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;

        if written != expected {
            return Err(ForecastError::Transfer(format!(
                "Short read for {}: expected {} bytes, got {}",
                key, expected, written
            )));
        }

        debug!(bytes = written, "Downloaded object");
        Ok(written)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn get(&self, key: &str) -> ForecastResult<Bytes> {
        let location = ObjectPath::from(key);

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| read_error(key, e))?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| ForecastError::Transfer(format!("Failed to read bytes: {}", e)))?;

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn read_error(key: &str, err: object_store::Error) -> ForecastError {
    match err {
        object_store::Error::NotFound { .. } => ForecastError::MissingObject(key.to_string()),
        e => ForecastError::Transfer(format!("Failed to read {}: {}", key, e)),
    }
}
