use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Direction of byte traffic counted against the daily per-address caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficKind {
    Upload,
    Download,
}

impl std::fmt::Display for TrafficKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrafficKind::Upload => write!(f, "upload"),
            TrafficKind::Download => write!(f, "download"),
        }
    }
}

/// One source address's traffic counters for one calendar day (UTC).
///
/// At most one record exists per (source_address, day); counters start at
/// zero and only ever grow within a day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct QuotaRecord {
    pub source_address: String,
    pub day: NaiveDate,
    pub upload_bytes: i64,
    pub download_bytes: i64,
}

impl QuotaRecord {
    /// Zero-valued record for an address with no traffic recorded today.
    pub fn zero(source_address: impl Into<String>, day: NaiveDate) -> Self {
        Self {
            source_address: source_address.into(),
            day,
            upload_bytes: 0,
            download_bytes: 0,
        }
    }

    pub fn bytes_for(&self, kind: TrafficKind) -> i64 {
        match kind {
            TrafficKind::Upload => self.upload_bytes,
            TrafficKind::Download => self.download_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_record_has_no_traffic() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let record = QuotaRecord::zero("10.0.0.5", day);
        assert_eq!(record.bytes_for(TrafficKind::Upload), 0);
        assert_eq!(record.bytes_for(TrafficKind::Download), 0);
    }

    #[test]
    fn traffic_kind_display() {
        assert_eq!(TrafficKind::Upload.to_string(), "upload");
        assert_eq!(TrafficKind::Download.to_string(), "download");
    }
}
