//! Dropkey Database Layer
//!
//! Repositories for file metadata and per-address traffic accounting.
//! `FileRecordStore` and `QuotaLedger` are the contracts the lifecycle
//! manager is written against; Postgres implementations back the service,
//! the in-memory implementations back tests and embedded use.

pub mod db;

pub use db::memory::{MemoryFileRecordStore, MemoryQuotaLedger};
pub use db::{FileRecordStore, PgFileRecordStore, PgQuotaLedger, QuotaLedger};

/// Embedded SQL migrations, applied with `MIGRATOR.run(&pool)` at startup.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();
