//! Constant-time operations for digest verification.

use subtle::ConstantTimeEq;

/// Compare two byte slices in constant time.
///
/// Lengths are not secret; a length mismatch returns early.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Compare two hex strings in constant time, ignoring ASCII letter case.
pub fn constant_time_hex_eq(a: &str, b: &str) -> bool {
    let a = a.to_ascii_lowercase();
    let b = b.to_ascii_lowercase();
    constant_time_compare(a.as_bytes(), b.as_bytes())
}
