//! Cipher set identifiers.

use std::fmt;
use std::str::FromStr;

/// One-byte cipher set identifier.
///
/// Rendered as two lowercase hex digits (`1a`), which is also how it appears
/// as a key in handshake headers and identity files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Csid(pub u8);

impl Csid {
    /// Reference suite: secp160r1, AES-128-CTR, HMAC-SHA256.
    pub const CS1A: Csid = Csid(0x1a);
}

impl fmt::Display for Csid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

/// Text that is not exactly two lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid CSID {0:?}")]
pub struct ParseCsidError(pub String);

impl FromStr for Csid {
    type Err = ParseCsidError;

    /// Only the canonical form is accepted, so each CSID has one spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let canonical = s.len() == 2 && s.bytes().all(|c| matches!(c, b'0'..=b'9' | b'a'..=b'f'));
        if !canonical {
            return Err(ParseCsidError(s.to_string()));
        }
        u8::from_str_radix(s, 16)
            .map(Csid)
            .map_err(|_| ParseCsidError(s.to_string()))
    }
}

impl From<u8> for Csid {
    fn from(value: u8) -> Self {
        Csid(value)
    }
}

/// Read the CSID of a handshake message framed as a LOB packet with a
/// one-byte binary header (`00 01 csid ...`).
pub fn extract_csid(raw: &[u8]) -> Option<Csid> {
    match raw {
        [0, 1, csid, ..] => Some(Csid(*csid)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        assert_eq!(Csid::CS1A.to_string(), "1a");
        assert_eq!(Csid(0x01).to_string(), "01");
        assert_eq!("1a".parse::<Csid>().unwrap(), Csid::CS1A);
        assert!("zz".parse::<Csid>().is_err());
        assert!("100".parse::<Csid>().is_err());
    }

    #[test]
    fn test_parse_rejects_non_canonical_text() {
        for text in ["+1", "1A", "A1", "1", "", " 1a", "0x1a", "-1"] {
            assert_eq!(text.parse::<Csid>(), Err(ParseCsidError(text.to_string())));
        }
        assert_eq!("01".parse::<Csid>(), Ok(Csid(0x01)));
        assert_eq!("ff".parse::<Csid>(), Ok(Csid(0xff)));
    }

    #[test]
    fn test_extract_csid() {
        assert_eq!(extract_csid(&[0, 1, 0x1a, 9, 9]), Some(Csid::CS1A));
        assert_eq!(extract_csid(&[0, 0, 0x1a]), None);
        assert_eq!(extract_csid(&[0, 1]), None);
    }
}
