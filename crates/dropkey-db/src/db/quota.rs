use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use dropkey_core::models::{QuotaRecord, TrafficKind};
use dropkey_core::AppError;

use super::QuotaLedger;

#[derive(Clone)]
pub struct PgQuotaLedger {
    pool: PgPool,
}

impl PgQuotaLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuotaLedger for PgQuotaLedger {
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
        // Guards the fresh-insert path; the conflict path is guarded by the
        // conditional update below.
        if amount > limit {
            return Ok(false);
        }

        let column = match kind {
            TrafficKind::Upload => "upload_bytes",
            TrafficKind::Download => "download_bytes",
        };

        // Single conditional statement: the row is created or incremented only
        // when the new total stays within the limit, so two concurrent
        // requests cannot both pass a separate check and jointly overshoot.
        let admitted = sqlx::query(&format!(
            r#"
            INSERT INTO ip_usage (source_address, day, {column})
            VALUES ($1, $2, $3)
            ON CONFLICT (source_address, day) DO UPDATE
            SET {column} = ip_usage.{column} + EXCLUDED.{column}
            WHERE ip_usage.{column} + EXCLUDED.{column} <= $4
            RETURNING id
            "#,
        ))
        .bind(source_address)
        .bind(day)
        .bind(amount)
        .bind(limit)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, source_address, "Failed to update quota ledger");
            AppError::Internal("Failed to update quota ledger".to_string())
        })?
        .is_some();

        if !admitted {
            tracing::warn!(
                source_address,
                kind = %kind,
                amount,
                limit,
                "Daily traffic limit would be exceeded, request rejected"
            );
        }
        Ok(admitted)
    }

    async fn get(&self, source_address: &str, day: NaiveDate) -> Result<QuotaRecord, AppError> {
        let record = sqlx::query_as::<_, QuotaRecord>(
            r#"
            SELECT source_address, day, upload_bytes, download_bytes
            FROM ip_usage
            WHERE source_address = $1 AND day = $2
            "#,
        )
        .bind(source_address)
        .bind(day)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, source_address, "Failed to fetch quota record");
            AppError::Internal("Failed to fetch quota record".to_string())
        })?;

        Ok(record.unwrap_or_else(|| QuotaRecord::zero(source_address, day)))
    }
}
