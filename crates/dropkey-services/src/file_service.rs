use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use uuid::Uuid;

use dropkey_core::models::{FileRecord, KeyPair, NewFileRecord, TrafficKind};
use dropkey_core::{AppError, Config};
use dropkey_db::{FileRecordStore, QuotaLedger};
use dropkey_storage::{Storage, StorageError, StorageResult, StoredObject};

/// Bounded regeneration attempts for capability-token collisions. With
/// 128-bit tokens a single collision is already negligible; exhausting the
/// bound indicates something is broken, not unlucky.
const MAX_KEY_ATTEMPTS: usize = 3;

/// Daily per-source-address byte caps.
#[derive(Debug, Clone, Copy)]
pub struct TrafficLimits {
    pub max_upload_bytes: i64,
    pub max_download_bytes: i64,
}

impl TrafficLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_upload_bytes: config.max_upload_bytes_per_ip,
            max_download_bytes: config.max_download_bytes_per_ip,
        }
    }
}

/// The two capability tokens returned to the uploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadReceipt {
    pub public_key: Uuid,
    pub private_key: Uuid,
}

/// An opened download: chunked bytes plus the metadata the caller serves
/// alongside them.
pub struct FileDownload {
    pub stream: Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>,
    pub size: i64,
    pub mimetype: String,
    pub filename: String,
}

impl std::fmt::Debug for FileDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDownload")
            .field("size", &self.size)
            .field("mimetype", &self.mimetype)
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

/// Outcome of one cleanup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub examined: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Orchestrates upload, download, delete and the cleanup sweep across the
/// storage provider, the record store and the quota ledger. Each file moves
/// `absent -> stored -> deleted` with no way back.
pub struct FileService {
    files: Arc<dyn FileRecordStore>,
    quota: Arc<dyn QuotaLedger>,
    storage: Arc<dyn Storage>,
    limits: TrafficLimits,
}

impl FileService {
    pub fn new(
        files: Arc<dyn FileRecordStore>,
        quota: Arc<dyn QuotaLedger>,
        storage: Arc<dyn Storage>,
        limits: TrafficLimits,
    ) -> Self {
        Self {
            files,
            quota,
            storage,
            limits,
        }
    }

    /// Store the bytes, record the metadata under fresh capability tokens and
    /// debit the uploader's daily quota, in that order. The quota debit comes
    /// last so only confirmed storage is ever charged; any later failure
    /// best-effort removes what the earlier steps left behind.
    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    pub async fn upload(
        &self,
        data: Vec<u8>,
        filename: &str,
        content_type: &str,
        source_address: &str,
    ) -> Result<UploadReceipt, AppError> {
        if data.is_empty() {
            return Err(AppError::Validation("uploaded file is empty".to_string()));
        }

        let stored = self
            .storage
            .save(data, content_type)
            .await
            .map_err(|e| AppError::StorageWrite(e.to_string()))?;

        let record = match self
            .create_with_fresh_keys(filename, content_type, &stored)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                self.discard_stored(&stored.storage_key).await;
                return Err(e);
            }
        };

        let admitted = match self
            .quota
            .check_and_reserve(
                source_address,
                Utc::now().date_naive(),
                TrafficKind::Upload,
                record.size,
                self.limits.max_upload_bytes,
            )
            .await
        {
            Ok(admitted) => admitted,
            Err(e) => {
                self.rollback_upload(&record).await;
                return Err(e);
            }
        };
        if !admitted {
            self.rollback_upload(&record).await;
            return Err(AppError::QuotaExceeded {
                kind: TrafficKind::Upload,
                limit: self.limits.max_upload_bytes,
            });
        }

        tracing::info!(
            file_id = %record.id,
            size = record.size,
            "File uploaded"
        );
        Ok(UploadReceipt {
            public_key: record.public_key,
            private_key: record.private_key,
        })
    }

    /// Resolve the public key, open the stored bytes, debit the download
    /// quota and refresh the access time. A quota rejection drops the stream
    /// unconsumed and does not count as an access.
    #[tracing::instrument(skip(self))]
    pub async fn download(
        &self,
        public_key: Uuid,
        source_address: &str,
    ) -> Result<FileDownload, AppError> {
        let record = self
            .files
            .find_by_public_key(public_key)
            .await?
            .ok_or_else(|| AppError::NotFound("file not found".to_string()))?;

        let object = match self.storage.fetch(&record.storage_key).await {
            Ok(object) => object,
            Err(StorageError::NotFound(_)) => {
                // Metadata/storage divergence: alerted distinctly, but the
                // caller only learns the file is unavailable.
                let fault = AppError::Consistency(format!(
                    "record {} has no stored object under key {}",
                    record.id, record.storage_key
                ));
                tracing::error!(
                    error = %fault,
                    error_type = fault.error_type(),
                    file_id = %record.id,
                    "Stored bytes missing for existing record"
                );
                return Err(AppError::NotFound("file not found".to_string()));
            }
            Err(e) => return Err(AppError::StorageRead(e.to_string())),
        };

        let admitted = self
            .quota
            .check_and_reserve(
                source_address,
                Utc::now().date_naive(),
                TrafficKind::Download,
                record.size,
                self.limits.max_download_bytes,
            )
            .await?;
        if !admitted {
            return Err(AppError::QuotaExceeded {
                kind: TrafficKind::Download,
                limit: self.limits.max_download_bytes,
            });
        }

        self.files.touch(record.id).await?;

        tracing::debug!(file_id = %record.id, size = record.size, "File download opened");
        Ok(FileDownload {
            stream: object.stream,
            size: record.size,
            mimetype: record.mimetype,
            filename: record.filename,
        })
    }

    /// Remove the record (atomic find-then-remove) and then the stored
    /// bytes. Storage delete is idempotent, so a previously dangling object
    /// does not fail the operation.
    #[tracing::instrument(skip(self, private_key))]
    pub async fn delete(&self, private_key: Uuid) -> Result<(), AppError> {
        let record = self
            .files
            .delete_by_private_key(private_key)
            .await?
            .ok_or_else(|| AppError::NotFound("file not found".to_string()))?;

        self.storage
            .delete(&record.storage_key)
            .await
            .map_err(|e| AppError::StorageWrite(e.to_string()))?;

        tracing::info!(file_id = %record.id, filename = %record.filename, "File deleted");
        Ok(())
    }

    /// Delete every file inactive beyond the threshold. One record's failure
    /// is logged and skipped; it never aborts the rest of the batch.
    #[tracing::instrument(skip(self))]
    pub async fn cleanup_sweep(&self, threshold_days: i64) -> Result<SweepStats, AppError> {
        let inactive = self.files.list_inactive_since(threshold_days).await?;
        tracing::info!(count = inactive.len(), threshold_days, "Found inactive files for cleanup");

        let mut stats = SweepStats {
            examined: inactive.len(),
            ..Default::default()
        };
        for record in inactive {
            match self.delete(record.private_key).await {
                Ok(()) => {
                    stats.deleted += 1;
                    tracing::info!(filename = %record.filename, "Cleaned up inactive file");
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::error!(
                        error = %e,
                        filename = %record.filename,
                        "Failed to clean up inactive file"
                    );
                }
            }
        }
        Ok(stats)
    }

    async fn create_with_fresh_keys(
        &self,
        filename: &str,
        mimetype: &str,
        stored: &StoredObject,
    ) -> Result<FileRecord, AppError> {
        for attempt in 1..=MAX_KEY_ATTEMPTS {
            let keys = KeyPair::generate();
            match self
                .files
                .create(NewFileRecord {
                    filename: filename.to_string(),
                    storage_key: stored.storage_key.clone(),
                    mimetype: mimetype.to_string(),
                    public_key: keys.public_key,
                    private_key: keys.private_key,
                    size: stored.size as i64,
                })
                .await
            {
                Ok(record) => return Ok(record),
                Err(AppError::Conflict(_)) => {
                    tracing::warn!(attempt, "Capability key collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }
        Err(AppError::Internal(
            "exhausted capability key regeneration attempts".to_string(),
        ))
    }

    async fn rollback_upload(&self, record: &FileRecord) {
        if let Err(e) = self.files.delete_by_private_key(record.private_key).await {
            tracing::warn!(error = %e, file_id = %record.id, "Failed to remove record during upload rollback");
        }
        self.discard_stored(&record.storage_key).await;
    }

    async fn discard_stored(&self, storage_key: &str) {
        if let Err(e) = self.storage.delete(storage_key).await {
            tracing::warn!(error = %e, key = %storage_key, "Failed to discard stored bytes");
        }
    }
}
