//! Error types for the crypto crate.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during crypto operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Input could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        /// File being hashed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Digest string is not 64 hex characters
    #[error("Invalid SHA-256 digest: {0}")]
    InvalidDigest(String),
}
