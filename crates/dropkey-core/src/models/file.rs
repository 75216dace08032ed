use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata for one uploaded object.
///
/// `public_key` and `private_key` are the two capability tokens handed back
/// to the uploader; each is unique across all records. `storage_key` is the
/// backend locator and is opaque outside the storage provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FileRecord {
    pub id: Uuid,
    pub filename: String,
    pub storage_key: String,
    pub mimetype: String,
    pub public_key: Uuid,
    pub private_key: Uuid,
    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
    /// Refreshed on successful download only; drives cleanup eligibility.
    pub last_accessed_at: DateTime<Utc>,
}

/// Input for inserting a new file record. Timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub filename: String,
    pub storage_key: String,
    pub mimetype: String,
    pub public_key: Uuid,
    pub private_key: Uuid,
    pub size: i64,
}

/// A freshly generated capability token pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPair {
    pub public_key: Uuid,
    pub private_key: Uuid,
}

impl KeyPair {
    /// Generate two independent random 128-bit tokens.
    ///
    /// The pair is guaranteed distinct; global uniqueness is enforced by the
    /// record store's unique constraints, with regeneration on collision.
    pub fn generate() -> Self {
        loop {
            let public_key = Uuid::new_v4();
            let private_key = Uuid::new_v4();
            if public_key != private_key {
                return Self {
                    public_key,
                    private_key,
                };
            }
        }
    }
}
