//! In-memory implementations of the record store and quota ledger.
//!
//! Used by service-level tests and by embedded deployments that do not carry
//! a Postgres instance. Semantics mirror the Postgres repositories, including
//! conflict detection and atomic check-and-reserve.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use dropkey_core::models::{FileRecord, NewFileRecord, QuotaRecord, TrafficKind};
use dropkey_core::AppError;

use super::{FileRecordStore, QuotaLedger};

#[derive(Clone, Default)]
pub struct MemoryFileRecordStore {
    records: Arc<Mutex<HashMap<Uuid, FileRecord>>>,
}

impl MemoryFileRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a fully formed record, timestamps included. Lets callers stage
    /// histories (e.g. long-inactive files) that the public contract cannot
    /// produce directly.
    pub async fn insert_record(&self, record: FileRecord) {
        self.records.lock().await.insert(record.id, record);
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    pub async fn get(&self, id: Uuid) -> Option<FileRecord> {
        self.records.lock().await.get(&id).cloned()
    }
}

#[async_trait]
impl FileRecordStore for MemoryFileRecordStore {
    async fn create(&self, record: NewFileRecord) -> Result<FileRecord, AppError> {
        let mut records = self.records.lock().await;

        let collision = records.values().any(|existing| {
            existing.public_key == record.public_key
                || existing.private_key == record.private_key
                || existing.public_key == record.private_key
                || existing.private_key == record.public_key
        });
        if collision {
            return Err(AppError::Conflict(
                "capability key already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let created = FileRecord {
            id: Uuid::new_v4(),
            filename: record.filename,
            storage_key: record.storage_key,
            mimetype: record.mimetype,
            public_key: record.public_key,
            private_key: record.private_key,
            size: record.size,
            uploaded_at: now,
            last_accessed_at: now,
        };
        records.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_public_key(&self, key: Uuid) -> Result<Option<FileRecord>, AppError> {
        let records = self.records.lock().await;
        Ok(records.values().find(|r| r.public_key == key).cloned())
    }

    async fn find_by_private_key(&self, key: Uuid) -> Result<Option<FileRecord>, AppError> {
        let records = self.records.lock().await;
        Ok(records.values().find(|r| r.private_key == key).cloned())
    }

    async fn delete_by_private_key(&self, key: Uuid) -> Result<Option<FileRecord>, AppError> {
        let mut records = self.records.lock().await;
        let id = records
            .values()
            .find(|r| r.private_key == key)
            .map(|r| r.id);
        Ok(id.and_then(|id| records.remove(&id)))
    }

    async fn touch(&self, id: Uuid) -> Result<(), AppError> {
        let mut records = self.records.lock().await;
        match records.get_mut(&id) {
            Some(record) => {
                record.last_accessed_at = Utc::now();
                Ok(())
            }
            None => Err(AppError::NotFound("file record not found".to_string())),
        }
    }

    async fn list_inactive_since(&self, threshold_days: i64) -> Result<Vec<FileRecord>, AppError> {
        let cutoff = Utc::now() - Duration::days(threshold_days);
        let records = self.records.lock().await;
        Ok(records
            .values()
            .filter(|r| r.last_accessed_at < cutoff)
            .cloned()
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct MemoryQuotaLedger {
    usage: Arc<Mutex<HashMap<(String, NaiveDate), QuotaRecord>>>,
}

impl MemoryQuotaLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaLedger for MemoryQuotaLedger {
    async fn check_and_reserve(
        &self,
        source_address: &str,
        day: NaiveDate,
        kind: TrafficKind,
        amount: i64,
        limit: i64,
    ) -> Result<bool, AppError> {
        if amount < 0 {
            return Err(AppError::Validation(
                "quota debit amount must be non-negative".to_string(),
            ));
        }

        // The map lock makes the check and the increment one unit, matching
        // the Postgres ledger's conditional upsert.
        let mut usage = self.usage.lock().await;
        let record = usage
            .entry((source_address.to_string(), day))
            .or_insert_with(|| QuotaRecord::zero(source_address, day));

        if record.bytes_for(kind) + amount > limit {
            return Ok(false);
        }
        match kind {
            TrafficKind::Upload => record.upload_bytes += amount,
            TrafficKind::Download => record.download_bytes += amount,
        }
        Ok(true)
    }

    async fn get(&self, source_address: &str, day: NaiveDate) -> Result<QuotaRecord, AppError> {
        let usage = self.usage.lock().await;
        Ok(usage
            .get(&(source_address.to_string(), day))
            .cloned()
            .unwrap_or_else(|| QuotaRecord::zero(source_address, day)))
    }
}

/// Backdate a record's access time without the store's own clock getting in
/// the way; test helper for cleanup eligibility scenarios.
pub fn backdated(record: FileRecord, last_accessed_at: DateTime<Utc>) -> FileRecord {
    FileRecord {
        last_accessed_at,
        ..record
    }
}
