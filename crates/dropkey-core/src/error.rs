use thiserror::Error;

use crate::models::TrafficKind;

/// Application error taxonomy.
///
/// `Consistency` marks metadata/storage divergence; it is logged for
/// operational alerting and translated to `NotFound` before reaching a
/// caller, since from the client's perspective the file is unavailable
/// either way.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("daily {kind} limit of {limit} bytes exceeded")]
    QuotaExceeded { kind: TrafficKind, limit: i64 },

    #[error("storage write failed: {0}")]
    StorageWrite(String),

    #[error("storage read failed: {0}")]
    StorageRead(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("consistency fault: {0}")]
    Consistency(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable tag, used in structured log events.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::QuotaExceeded { .. } => "quota_exceeded",
            AppError::StorageWrite(_) => "storage_write",
            AppError::StorageRead(_) => "storage_read",
            AppError::Conflict(_) => "conflict",
            AppError::Consistency(_) => "consistency",
            AppError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_exceeded_message_names_kind_and_limit() {
        let err = AppError::QuotaExceeded {
            kind: TrafficKind::Upload,
            limit: 524288,
        };
        assert_eq!(err.to_string(), "daily upload limit of 524288 bytes exceeded");
        assert_eq!(err.error_type(), "quota_exceeded");
    }
}
