use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use thiserror::Error;

use dropkey_core::StorageBackend;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("delete failed: {0}")]
    DeleteFailed(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Locator and confirmed length of a newly persisted object.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub storage_key: String,
    pub size: u64,
}

/// An opened object: a chunked byte stream plus the backend-reported length.
///
/// The stream may be partially consumed and dropped early; providers must
/// release the underlying handle either way.
pub struct ObjectStream {
    pub stream: Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>,
    pub size: u64,
}

impl std::fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStream")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Uniform contract over the physical byte stores. The backend is chosen
/// once at startup from configuration; callers never branch on the variant.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist content under a freshly generated key and return the locator
    /// with the confirmed byte length. A failed save must not leave a
    /// readable partial artifact behind.
    async fn save(&self, data: Vec<u8>, content_type: &str) -> StorageResult<StoredObject>;

    /// Open the object for sequential read. `StorageError::NotFound` if the
    /// key is absent.
    async fn fetch(&self, storage_key: &str) -> StorageResult<ObjectStream>;

    /// Idempotent delete: removing an already-absent key is success, since
    /// the desired end state was already reached.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Non-throwing existence probe.
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    fn backend_type(&self) -> StorageBackend;
}
