//! Unpadded lowercase base-32, the text encoding for keys, parts and hashnames.

use base32::Alphabet;

const ALPHABET: Alphabet = Alphabet::Rfc4648 { padding: false };

/// Encode bytes as unpadded lowercase base-32.
pub fn encode(data: &[u8]) -> String {
    base32::encode(ALPHABET, data).to_ascii_lowercase()
}

/// Decode unpadded base-32. Both cases are accepted.
pub fn decode(text: &str) -> Option<Vec<u8>> {
    if !text.bytes().all(|c| c.is_ascii_alphabetic() || (b'2'..=b'7').contains(&c)) {
        return None;
    }
    base32::decode(ALPHABET, &text.to_ascii_uppercase())
}
