//! Dropkey Worker
//!
//! The inactivity cleanup scheduler.
//!
//! A recurring timer that asks the lifecycle manager to sweep files whose
//! last access predates the configured threshold. The loop awaits each
//! sweep before ticking again, so at most one sweep is ever in flight.

mod cleanup;

pub use cleanup::{CleanupConfig, CleanupScheduler};
