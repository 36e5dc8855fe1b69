//! Error types for Pipecache.
//!
//! All errors in Pipecache are represented by the `PipecacheError` enum.
//! `Validation`, `NotFound` and `Busy` are raised synchronously by the call that
//! caused them. `Remote` only describes a rejection from the remote authority; it
//! is carried by events and logs, never returned to the caller of the original
//! mutation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Pipecache operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum PipecacheError {
    /// A local constraint was violated (bad port, malformed parameter, unknown template).
    #[error("validation error: {0}")]
    Validation(String),

    /// Lookup of an id that is not in the local cache.
    #[error("not found: {0}")]
    NotFound(String),

    /// A mutation was attempted while the record still has a remote operation in flight.
    #[error("busy: {0}")]
    Busy(String),

    /// The remote authority refused an operation.
    #[error("rejected by remote: {0}")]
    Remote(String),

    /// Configuration parsing errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, TOML).
    #[error("{0}")]
    Convert(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),
}

impl From<PipecacheError> for String {
    fn from(val: PipecacheError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for PipecacheError {
    fn from(error: std::io::Error) -> Self {
        PipecacheError::IoError(error.to_string())
    }
}

impl From<serde_json::Error> for PipecacheError {
    fn from(error: serde_json::Error) -> Self {
        PipecacheError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for PipecacheError {
    fn from(error: toml::de::Error) -> Self {
        PipecacheError::Config(error.to_string())
    }
}
