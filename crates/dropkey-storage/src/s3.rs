use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures::StreamExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use dropkey_core::StorageBackend;

use crate::traits::{ObjectStream, Storage, StorageError, StorageResult, StoredObject};

/// S3 (and S3-compatible) object storage.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3Storage instance.
    ///
    /// `endpoint_url` switches the client to an S3-compatible provider
    /// (e.g. "http://localhost:9000" for MinIO) with path-style addressing.
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let region_provider = RegionProviderChain::first_try(aws_config::Region::new(region));

        let retry_config = RetryConfig::standard()
            .with_max_attempts(5)
            .with_retry_mode(RetryMode::Adaptive);

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config.clone())
            .load()
            .await;

        let client = if let Some(ref endpoint) = endpoint_url {
            let mut builder = aws_sdk_s3::Config::builder()
                .endpoint_url(endpoint)
                .region(config.region().cloned())
                .retry_config(retry_config);
            if let Some(provider) = config.credentials_provider().into_iter().next() {
                builder = builder.credentials_provider(provider);
            }
            // Path-style addressing is required by MinIO and most
            // S3-compatible providers.
            builder = builder.force_path_style(true);
            Client::from_conf(builder.build())
        } else {
            Client::new(&config)
        };

        Ok(S3Storage { client, bucket })
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn save(&self, data: Vec<u8>, content_type: &str) -> StorageResult<StoredObject> {
        let storage_key = Uuid::new_v4().to_string();
        let size = data.len() as u64;
        let body = ByteStream::from(Bytes::from(data));

        let start = std::time::Instant::now();

        // put_object resolves only once the remote store has acknowledged
        // the write; there is no local staging copy to clean up.
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&storage_key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 save failed"
                );
                StorageError::WriteFailed(e.to_string())
            })?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 save successful"
        );

        Ok(StoredObject { storage_key, size })
    }

    async fn fetch(&self, storage_key: &str) -> StorageResult<ObjectStream> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(storage_key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err) => match service_err.err() {
                    GetObjectError::NoSuchKey(_) => StorageError::NotFound(storage_key.to_string()),
                    _ => {
                        tracing::error!(error = %e, bucket = %self.bucket, key = %storage_key, "S3 fetch failed");
                        StorageError::ReadFailed(e.to_string())
                    }
                },
                _ => {
                    tracing::error!(error = %e, bucket = %self.bucket, key = %storage_key, "S3 fetch failed");
                    StorageError::ReadFailed(e.to_string())
                }
            })?;

        let size = response.content_length().unwrap_or(0).max(0) as u64;

        let stream = ReaderStream::new(response.body.into_async_read())
            .map(|chunk| chunk.map_err(|e| StorageError::ReadFailed(e.to_string())));

        Ok(ObjectStream {
            stream: Box::pin(stream),
            size,
        })
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        // S3 treats deleting an absent key as success, matching the
        // idempotent contract without an extra existence probe.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(storage_key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, bucket = %self.bucket, key = %storage_key, "S3 delete failed");
                StorageError::DeleteFailed(e.to_string())
            })?;
        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(storage_key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match &e {
                SdkError::ServiceError(service_err) => match service_err.err() {
                    HeadObjectError::NotFound(_) => Ok(false),
                    _ => Err(StorageError::Backend(e.to_string())),
                },
                _ => Err(StorageError::Backend(e.to_string())),
            },
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
