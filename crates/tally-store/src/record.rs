//! Textual encoding of the shared counter record.
//!
//! The record is a base-10 non-negative integer that fits in a `u64`
//! (at most 20 digits). An empty record decodes as `0`; surrounding ASCII
//! whitespace is ignored. Signs, non-digits and overflow are malformed.

use std::fmt;

/// Longest canonical encoding of a `u64` (`18446744073709551615`).
pub const MAX_RECORD_LEN: usize = 20;

/// A stored value that is not a valid record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MalformedRecord {
    pub raw: String,
}

impl fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stored value is not a non-negative integer: {:?}", self.raw)
    }
}

impl std::error::Error for MalformedRecord {}

/// Decode a stored record.
pub fn decode(raw: &str) -> Result<u64, MalformedRecord> {
    let t = raw.trim_matches(|c: char| c.is_ascii_whitespace());
    if t.is_empty() {
        return Ok(0);
    }
    // `u64::from_str` accepts a leading '+'; a record never carries a sign.
    if !t.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MalformedRecord { raw: raw.to_string() });
    }
    t.parse::<u64>()
        .map_err(|_| MalformedRecord { raw: raw.to_string() })
}

/// Canonical encoding of `value`.
pub fn encode(value: u64) -> String {
    value.to_string()
}
