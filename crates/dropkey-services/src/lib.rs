//! Dropkey Services
//!
//! The file lifecycle manager: the single place that sequences storage,
//! metadata and quota accounting for uploads, downloads, deletes and the
//! cleanup sweep.

mod file_service;

pub use file_service::{FileDownload, FileService, SweepStats, TrafficLimits, UploadReceipt};
