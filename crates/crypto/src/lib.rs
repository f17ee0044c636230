//! Cryptographic utilities for tamperguard.
//!
//! This crate provides:
//! - SHA-256 digests of byte slices and files, rendered as lowercase hex
//! - Normalisation of caller-supplied hex digests
//! - Constant-time comparison for digest verification

#![warn(missing_docs)]

mod digest;
mod error;
mod timing;

pub use digest::{digest_matches, normalize_sha256_hex, sha256_file, sha256_hex, SHA256_HEX_LEN};
pub use error::{CryptoError, Result};
pub use timing::{constant_time_compare, constant_time_hex_eq};
