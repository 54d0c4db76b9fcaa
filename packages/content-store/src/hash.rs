//! Content hashes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length in characters of a canonical hash (hex-encoded SHA-256).
const CANONICAL_LEN: usize = 64;

/// The key of a stored blob: lowercase hex SHA-256 of its bytes.
///
/// Hashes produced by [`ContentHash::of`] are always canonical. A hash built
/// from an arbitrary string (for example a path segment from a request) is
/// accepted as a lookup key as-is; if it is not canonical it simply never
/// matches a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Compute the hash of `data`.
    pub fn of(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }

    /// Borrow the hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this looks like a hash the store could have produced:
    /// 64 lowercase hex characters.
    pub fn is_canonical(&self) -> bool {
        self.0.len() == CANONICAL_LEN
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }

    /// Whether `data` hashes to this value.
    pub fn matches(&self, data: &[u8]) -> bool {
        *self == Self::of(data)
    }
}

impl From<String> for ContentHash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ContentHash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
