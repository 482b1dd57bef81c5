//! Line tokens: 16-byte routing tags derived from a line public key.

use std::fmt;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Token width in bytes.
pub const TOKEN_LEN: usize = 16;

/// Routes an incoming line packet to its session without decrypting it.
#[derive(Clone, Copy, Default, Hash)]
pub struct Token(pub [u8; TOKEN_LEN]);

impl Token {
    pub const ZERO: Token = Token([0u8; TOKEN_LEN]);

    /// `SHA256(public[..16])[..16]`.
    ///
    /// Uses fewer bytes when the encoding is shorter than 16.
    pub fn from_line_key(public: &[u8]) -> Self {
        let prefix = &public[..public.len().min(TOKEN_LEN)];
        let digest = Sha256::digest(prefix);
        let mut token = [0u8; TOKEN_LEN];
        token.copy_from_slice(&digest[..TOKEN_LEN]);
        Token(token)
    }

    /// Read a token from raw wire bytes without decoding them.
    ///
    /// A handshake (`00 01 csid line_key ...`) yields the token of the
    /// sender's line key; a line packet (`00 00 token ...`) carries it
    /// directly. Anything else yields [`Token::ZERO`].
    pub fn extract(raw: &[u8]) -> Self {
        match raw {
            [0, 1, _csid, line_key @ ..] if line_key.len() >= TOKEN_LEN => {
                Token::from_line_key(line_key)
            }
            [0, 0, rest @ ..] if rest.len() >= TOKEN_LEN => {
                let mut token = [0u8; TOKEN_LEN];
                token.copy_from_slice(&rest[..TOKEN_LEN]);
                Token(token)
            }
            _ => Token::ZERO,
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let token: [u8; TOKEN_LEN] = bytes.try_into().ok()?;
        Some(Token(token))
    }

    pub fn as_bytes(&self) -> &[u8; TOKEN_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Token::ZERO
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for Token {}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_deterministic() {
        let line = [0x42u8; 21];
        assert_eq!(Token::from_line_key(&line), Token::from_line_key(&line));

        // only the first 16 bytes count
        let mut other = line;
        other[20] = 0;
        assert_eq!(Token::from_line_key(&line), Token::from_line_key(&other));

        other[0] = 0;
        assert_ne!(Token::from_line_key(&line), Token::from_line_key(&other));
    }

    #[test]
    fn test_token_value() {
        let token = Token::from_line_key(&[0u8; 16]);
        let digest = Sha256::digest([0u8; 16]);
        assert_eq!(token.as_bytes()[..], digest[..16]);
    }

    #[test]
    fn test_extract_from_handshake() {
        let line = [7u8; 21];
        let mut raw = vec![0, 1, 0x1a];
        raw.extend_from_slice(&line);
        raw.extend_from_slice(b"rest of message");
        assert_eq!(Token::extract(&raw), Token::from_line_key(&line));
    }

    #[test]
    fn test_extract_from_line_packet() {
        let mut raw = vec![0, 0];
        raw.extend_from_slice(&[9u8; 16]);
        raw.extend_from_slice(b"sealed");
        assert_eq!(Token::extract(&raw), Token([9u8; 16]));
    }

    #[test]
    fn test_extract_garbage_is_zero() {
        assert!(Token::extract(&[]).is_zero());
        assert!(Token::extract(&[0, 0, 1, 2]).is_zero());
        assert!(Token::extract(&[0, 2, 0x1a, 1, 2, 3]).is_zero());
        assert!(Token::extract(&[1; 40]).is_zero());
    }

    #[test]
    fn test_display_is_hex() {
        assert_eq!(Token([0xab; 16]).to_string(), "ab".repeat(16));
    }
}
