//! Object-storage persistence for terminal handlers (§4.6 steps 3).

use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use thiserror::Error;
use transit_core::TerminalConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object storage not configured")]
    NotConfigured,
    #[error("object storage client setup failed: {0}")]
    Setup(String),
    #[error("object storage write failed: {0}")]
    Write(String),
}

/// Construct the S3-compatible client from [`TerminalConfig`], or `None` if
/// `S3_BUCKET` is unset — absence is a deliberate no-op, not an error (§10).
pub fn build_store(config: &TerminalConfig) -> Result<Option<Box<dyn ObjectStore>>, StorageError> {
    let Some(bucket) = &config.s3_bucket else {
        return Ok(None);
    };

    let mut builder = AmazonS3Builder::new().with_bucket_name(bucket).with_region(&config.s3_region);

    if let Some(endpoint) = &config.s3_endpoint {
        builder = builder.with_endpoint(endpoint).with_allow_http(true);
    }
    if let (Some(key), Some(secret)) = (&config.s3_access_key, &config.s3_secret_key) {
        builder = builder.with_access_key_id(key).with_secret_access_key(secret);
    }

    let store = builder.build().map_err(|e| StorageError::Setup(e.to_string()))?;
    Ok(Some(Box::new(store)))
}

/// Write a JSON document at `key`. Returns the `(bucket, key)` pair the
/// caller turns into the `metadata`/storage-location value reported to the
/// gateway (§4.6 step 3-4).
pub async fn put_json(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    body: &serde_json::Value,
) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec(body).map_err(|e| StorageError::Write(e.to_string()))?;
    let path = ObjectPath::from(key);
    store
        .put(&path, Bytes::from(bytes).into())
        .await
        .map_err(|e| StorageError::Write(e.to_string()))?;
    tracing::debug!(bucket, key, "object persisted");
    Ok(())
}
