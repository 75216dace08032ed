//! Dropkey Core
//!
//! Shared models, error taxonomy and configuration for the anonymous
//! file-sharing core. Access to a file is capability-based: whoever holds
//! the public key may download it, whoever holds the private key may
//! delete it. There is no account model.

pub mod config;
pub mod error;
pub mod models;

pub use config::{Config, StorageBackend};
pub use error::AppError;
