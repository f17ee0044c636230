//! SHA-256 digests of bundled artifacts.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::{constant_time_hex_eq, CryptoError, Result};

/// Length of a SHA-256 digest rendered as hex.
pub const SHA256_HEX_LEN: usize = 64;

const READ_CHUNK: usize = 64 * 1024;

/// SHA-256 of `bytes` as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 of the whole content of the file at `path`, as lowercase hex.
///
/// The file is streamed in chunks; any read error fails the whole digest.
pub fn sha256_file(path: &Path) -> Result<String> {
    let read_err = |source| CryptoError::Read {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(read_err)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut buf).map_err(read_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Trim and lowercase a SHA-256 hex digest, rejecting anything malformed.
pub fn normalize_sha256_hex(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.len() != SHA256_HEX_LEN || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CryptoError::InvalidDigest(raw.to_string()));
    }
    Ok(trimmed.to_ascii_lowercase())
}

/// Whether `actual` equals `expected`, ignoring letter case.
///
/// Only case is folded; surrounding whitespace makes the digests differ.
pub fn digest_matches(actual: &str, expected: &str) -> bool {
    constant_time_hex_eq(actual, expected)
}
