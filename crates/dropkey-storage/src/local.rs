use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use dropkey_core::StorageBackend;

use crate::traits::{ObjectStream, Storage, StorageError, StorageResult, StoredObject};

/// Local filesystem storage: objects live as flat files under a configured
/// root directory.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create the root directory if needed and canonicalize it so every
    /// subsequent path check compares against a resolved prefix.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            tracing::error!(error = %e, root = %root.display(), "Failed to create storage root");
            StorageError::Backend(format!("failed to create storage root: {}", e))
        })?;
        let root = fs::canonicalize(&root)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to resolve storage root: {}", e)))?;
        Ok(Self { root })
    }

    /// Storage keys are single path components; anything with separators or
    /// parent references is rejected before touching the filesystem.
    fn validate_key(storage_key: &str) -> StorageResult<()> {
        let mut components = Path::new(storage_key).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(()),
            _ => Err(StorageError::InvalidKey(storage_key.to_string())),
        }
    }

    /// Resolve an existing object path and verify it is still under the root
    /// (canonicalize-and-prefix-check, guarding symlink escapes too).
    async fn resolve_existing(&self, storage_key: &str) -> StorageResult<PathBuf> {
        Self::validate_key(storage_key)?;
        let resolved = fs::canonicalize(self.root.join(storage_key))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StorageError::NotFound(storage_key.to_string()),
                _ => StorageError::Backend(format!("failed to resolve object path: {}", e)),
            })?;
        if !resolved.starts_with(&self.root) {
            return Err(StorageError::InvalidKey(storage_key.to_string()));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn save(&self, data: Vec<u8>, _content_type: &str) -> StorageResult<StoredObject> {
        let storage_key = Uuid::new_v4().to_string();
        let size = data.len() as u64;
        let final_path = self.root.join(&storage_key);
        let tmp_path = self.root.join(format!(".tmp-{}", storage_key));

        // Write to a temp name, then atomically rename into place, so a
        // failed write never leaves a readable partial artifact under a
        // fetchable key.
        if let Err(e) = fs::write(&tmp_path, &data).await {
            let _ = fs::remove_file(&tmp_path).await;
            tracing::error!(error = %e, key = %storage_key, "Local write failed");
            return Err(StorageError::WriteFailed(e.to_string()));
        }
        if let Err(e) = fs::rename(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            tracing::error!(error = %e, key = %storage_key, "Failed to finalize local write");
            return Err(StorageError::WriteFailed(e.to_string()));
        }

        tracing::debug!(key = %storage_key, size_bytes = size, "Local save successful");
        Ok(StoredObject { storage_key, size })
    }

    async fn fetch(&self, storage_key: &str) -> StorageResult<ObjectStream> {
        let path = self.resolve_existing(storage_key).await?;

        let file = fs::File::open(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(storage_key.to_string()),
            _ => StorageError::ReadFailed(e.to_string()),
        })?;
        let size = file
            .metadata()
            .await
            .map_err(|e| StorageError::ReadFailed(e.to_string()))?
            .len();

        // The file handle lives inside the stream; dropping the stream early
        // (client disconnect) closes it.
        let stream = ReaderStream::new(file)
            .map(|chunk| chunk.map_err(|e| StorageError::ReadFailed(e.to_string())));

        Ok(ObjectStream {
            stream: Box::pin(stream),
            size,
        })
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = match self.resolve_existing(storage_key).await {
            Ok(path) => path,
            Err(StorageError::NotFound(_)) => {
                // Already gone: the desired end state, not a fault.
                tracing::warn!(key = %storage_key, "Object not found during deletion");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(key = %storage_key, "Object not found during deletion");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, key = %storage_key, "Local delete failed");
                Err(StorageError::DeleteFailed(e.to_string()))
            }
        }
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        match self.resolve_existing(storage_key).await {
            Ok(path) => fs::try_exists(&path)
                .await
                .map_err(|e| StorageError::Backend(e.to_string())),
            Err(StorageError::NotFound(_)) | Err(StorageError::InvalidKey(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
