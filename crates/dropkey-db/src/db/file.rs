use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use dropkey_core::models::{FileRecord, NewFileRecord};
use dropkey_core::AppError;

use super::FileRecordStore;

const FILE_COLUMNS: &str = "id, filename, storage_key, mimetype, public_key, private_key, size, uploaded_at, last_accessed_at";

#[derive(Clone)]
pub struct PgFileRecordStore {
    pool: PgPool,
}

impl PgFileRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRecordStore for PgFileRecordStore {
    async fn create(&self, record: NewFileRecord) -> Result<FileRecord, AppError> {
        let created = sqlx::query_as::<_, FileRecord>(&format!(
            r#"
            INSERT INTO files (filename, storage_key, mimetype, public_key, private_key, size)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {FILE_COLUMNS}
            "#,
        ))
        .bind(&record.filename)
        .bind(&record.storage_key)
        .bind(&record.mimetype)
        .bind(record.public_key)
        .bind(record.private_key)
        .bind(record.size)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("capability key already exists".to_string())
            }
            _ => {
                tracing::error!(error = %e, "Failed to insert file record");
                AppError::Internal("Failed to insert file record".to_string())
            }
        })?;

        tracing::debug!(file_id = %created.id, size = created.size, "File record created");
        Ok(created)
    }

    async fn find_by_public_key(&self, key: Uuid) -> Result<Option<FileRecord>, AppError> {
        sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE public_key = $1",
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch file record by public key");
            AppError::Internal("Failed to fetch file record".to_string())
        })
    }

    async fn find_by_private_key(&self, key: Uuid) -> Result<Option<FileRecord>, AppError> {
        sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE private_key = $1",
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch file record by private key");
            AppError::Internal("Failed to fetch file record".to_string())
        })
    }

    async fn delete_by_private_key(&self, key: Uuid) -> Result<Option<FileRecord>, AppError> {
        let removed = sqlx::query_as::<_, FileRecord>(&format!(
            "DELETE FROM files WHERE private_key = $1 RETURNING {FILE_COLUMNS}",
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to delete file record");
            AppError::Internal("Failed to delete file record".to_string())
        })?;

        if let Some(ref record) = removed {
            tracing::debug!(file_id = %record.id, "File record removed");
        }
        Ok(removed)
    }

    async fn touch(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE files SET last_accessed_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, file_id = %id, "Failed to refresh access time");
                AppError::Internal("Failed to refresh access time".to_string())
            })?;
        Ok(())
    }

    async fn list_inactive_since(&self, threshold_days: i64) -> Result<Vec<FileRecord>, AppError> {
        let cutoff = Utc::now() - Duration::days(threshold_days);

        sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE last_accessed_at < $1",
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list inactive file records");
            AppError::Internal("Failed to list inactive file records".to_string())
        })
    }
}
