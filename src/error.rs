use std::io;

use thiserror::Error;

/// Unified error type for the storage engine.
///
/// Only failures live here. "Key not found" and "key deleted" are ordinary
/// results (see [`crate::types::Lookup`]), never errors.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error from disk operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Data corruption detected (bad trailer, malformed record, unknown version).
    #[error("Corruption: {0}")]
    Corruption(String),
    /// The sparse index region could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Invalid startup options.
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// A background maintenance cycle failed earlier; writes are refused.
    #[error("Background maintenance failed: {0}")]
    Background(String),
}

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;
