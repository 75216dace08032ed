use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use dropkey_core::models::{FileRecord, NewFileRecord, QuotaRecord, TrafficKind};
use dropkey_core::AppError;

mod file;
pub mod memory;
mod quota;

pub use file::PgFileRecordStore;
pub use quota::PgQuotaLedger;

/// Persistence contract for file metadata, keyed by capability tokens.
#[async_trait]
pub trait FileRecordStore: Send + Sync {
    /// Insert a new record. Fails with `AppError::Conflict` if either
    /// capability token collides with an existing record; the caller is
    /// expected to regenerate and retry rather than overwrite.
    async fn create(&self, record: NewFileRecord) -> Result<FileRecord, AppError>;

    async fn find_by_public_key(&self, key: Uuid) -> Result<Option<FileRecord>, AppError>;

    async fn find_by_private_key(&self, key: Uuid) -> Result<Option<FileRecord>, AppError>;

    /// Atomic find-then-remove. Returns the removed record so the caller can
    /// free its backing storage, or `None` if the key is unknown.
    async fn delete_by_private_key(&self, key: Uuid) -> Result<Option<FileRecord>, AppError>;

    /// Refresh `last_accessed_at` to now.
    async fn touch(&self, id: Uuid) -> Result<(), AppError>;

    /// Snapshot of records whose `last_accessed_at` predates now minus the
    /// threshold. Used by the cleanup sweep.
    async fn list_inactive_since(&self, threshold_days: i64) -> Result<Vec<FileRecord>, AppError>;
}

/// Per-(source address, day) byte accounting with atomic admission.
#[async_trait]
pub trait QuotaLedger: Send + Sync {
    /// Atomically add `amount` to the counter for `kind` unless the new total
    /// would exceed `limit`. Returns whether the traffic was admitted; a
    /// rejection leaves the counters untouched. The check and the increment
    /// are one unit, so concurrent requests from the same address cannot
    /// jointly race past the limit.
    async fn check_and_reserve(
        &self,
        source_address: &str,
        day: NaiveDate,
        kind: TrafficKind,
        amount: i64,
        limit: i64,
    ) -> Result<bool, AppError>;

    /// Read-only counters for diagnostics; zero-valued if no traffic yet.
    async fn get(&self, source_address: &str, day: NaiveDate) -> Result<QuotaRecord, AppError>;
}
