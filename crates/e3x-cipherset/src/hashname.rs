//! Hashnames: the content-derived address of an endpoint.
//!
//! A hashname is the base-32 encoded SHA-256 rollup of an endpoint's
//! [`Parts`](crate::Parts): 32 bytes encoded as 52 lowercase characters.

use std::fmt;

use crate::encoding;

/// Encoded hashname length.
pub const HASHNAME_LEN: usize = 52;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hashname(String);

impl Hashname {
    /// Hashname from the raw 32-byte rollup.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(encoding::encode(bytes))
    }

    /// Parse a hashname, accepting either case. The stored form is lowercase.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != HASHNAME_LEN {
            return None;
        }
        let bytes = encoding::decode(s)?;
        if bytes.len() != 32 {
            return None;
        }
        Some(Self(s.to_ascii_lowercase()))
    }

    pub fn to_bytes(&self) -> Option<[u8; 32]> {
        encoding::decode(&self.0)?.try_into().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hashname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Hashname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hashname({})", self.0)
    }
}
