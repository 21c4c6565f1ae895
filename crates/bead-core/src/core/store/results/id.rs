use std::fmt;
use std::str::FromStr;

use super::errors::ResultsCacheError;

/// Identifier of one cached result set.
///
/// Identifiers become part of file names, so only `[A-Za-z0-9_-]` is
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheId(String);

impl CacheId {
    pub const MAX_LEN: usize = 128;

    /// Validate a caller-supplied identifier.
    ///
    /// # Errors
    /// Returns [`ResultsCacheError::InvalidId`] for empty, overlong, or
    /// non filename-safe identifiers.
    pub fn parse(raw: &str) -> Result<Self, ResultsCacheError> {
        let invalid = |reason| ResultsCacheError::InvalidId {
            id: raw.to_string(),
            reason,
        };
        if raw.is_empty() {
            return Err(invalid("identifier is empty"));
        }
        if raw.len() > Self::MAX_LEN {
            return Err(invalid("identifier is longer than 128 characters"));
        }
        if !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(invalid("only ASCII letters, digits, '-' and '_' are allowed"));
        }
        Ok(Self(raw.to_string()))
    }

    /// Fresh random identifier (128 bits, hex encoded).
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::random();
        Self(hex::encode(bytes))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CacheId {
    type Err = ResultsCacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
