//! Canonical text form and content hashing.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Input text in canonical form: surrounding whitespace trimmed, lower-cased.
///
/// Every cache key, content hash and moderation check is derived from this
/// form so that `"Secret "` and `"secret"` resolve identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedText(String);

impl NormalizedText {
    /// Normalize raw input.
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    /// Get the canonical string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the canonical form is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Character count of the canonical form.
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    /// SHA-256 digest of the canonical form.
    pub fn content_hash(&self) -> ContentHash {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        ContentHash(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lowercase hex SHA-256 digest of a [`NormalizedText`].
///
/// Deserialization rejects anything that is not a well-formed digest, so a
/// tampered record cannot name an arbitrary file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Length of the hex digest.
    pub const LEN: usize = 64;

    /// Parse a hex digest, accepting only 64 lowercase hex characters.
    pub fn parse(value: &str) -> Option<Self> {
        let valid = value.len() == Self::LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(value.to_string()))
    }

    /// Get the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContentHash {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid content hash: {value:?}"))
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
