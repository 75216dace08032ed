//! Dropkey Storage
//!
//! Physical byte stores behind one `Storage` contract. The local variant
//! keeps objects as flat files under a configured root; the S3 variant keeps
//! them as objects in a bucket. Which one backs the service is decided once,
//! from configuration, at startup.

use std::sync::Arc;

mod traits;

#[cfg(feature = "storage-local")]
mod local;
#[cfg(feature = "storage-s3")]
mod s3;

pub use traits::{ObjectStream, Storage, StorageError, StorageResult, StoredObject};

#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;

use dropkey_core::{Config, StorageBackend};

/// Build the storage provider named by the configuration.
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    match config.storage_backend {
        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let storage = LocalStorage::new(config.local_storage_path.clone()).await?;
            tracing::info!(root = %config.local_storage_path.display(), "Using local storage backend");
            Ok(Arc::new(storage))
        }
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket
                .clone()
                .ok_or_else(|| StorageError::Backend("S3_BUCKET is not configured".to_string()))?;
            let region = config
                .s3_region
                .clone()
                .unwrap_or_else(|| "us-east-1".to_string());
            let storage =
                S3Storage::new(bucket.clone(), region, config.s3_endpoint_url.clone()).await?;
            tracing::info!(bucket = %bucket, "Using S3 storage backend");
            Ok(Arc::new(storage))
        }
        #[allow(unreachable_patterns)]
        other => Err(StorageError::Backend(format!(
            "storage backend {:?} not compiled in",
            other
        ))),
    }
}
