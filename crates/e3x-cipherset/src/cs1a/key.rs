//! cs1a keys: secp160r1 points and scalars.

use std::fmt;

use num_bigint::BigUint;
use num_traits::Zero;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use super::curve::{secp160r1, to_fixed_be, CurvePoint, COMPRESSED_LEN, SCALAR_BYTES};
use crate::csid::Csid;
use crate::encoding;
use crate::error::{CipherError, Result};
use crate::suite;

/// A secp160r1 key. Either component may be absent; immutable once built.
#[derive(Clone)]
pub struct Key {
    public: Option<CurvePoint>,
    private: Option<Zeroizing<[u8; SCALAR_BYTES]>>,
}

impl Key {
    /// Generate a key pair with a scalar uniform in `[1, n-1]`.
    pub fn generate() -> Result<Self> {
        let curve = secp160r1();
        let mut buf = Zeroizing::new([0u8; SCALAR_BYTES]);
        loop {
            OsRng
                .try_fill_bytes(&mut buf[..])
                .map_err(|e| CipherError::Entropy(e.to_string()))?;
            // n is 161 bits: keep one bit of the top byte, then reject
            buf[0] &= 0x01;
            let k = BigUint::from_bytes_be(&buf[..]);
            if !k.is_zero() && k < curve.n {
                return Self::from_private_bytes(&buf[..]);
            }
        }
    }

    /// Key pair from a big-endian scalar; the public point is derived.
    pub fn from_private_bytes(bytes: &[u8]) -> Result<Self> {
        let private = Self::check_scalar(bytes)?;
        let k = BigUint::from_bytes_be(&private[..]);
        let public = secp160r1().base_mult(&k).ok_or(CipherError::InvalidKey)?;
        Ok(Self {
            public: Some(public),
            private: Some(private),
        })
    }

    /// Public-only key from a point encoding.
    pub fn from_public_bytes(bytes: &[u8]) -> Result<Self> {
        let public = secp160r1().decompress(bytes).ok_or(CipherError::InvalidKey)?;
        Ok(Self {
            public: Some(public),
            private: None,
        })
    }

    /// Key from unpadded base-32 text. An empty string leaves that
    /// component absent.
    pub fn decode(public: &str, private: &str) -> Result<Self> {
        let mut key = Key {
            public: None,
            private: None,
        };

        if !public.is_empty() {
            let raw = encoding::decode(public).ok_or(CipherError::InvalidKey)?;
            key.public = Some(secp160r1().decompress(&raw).ok_or(CipherError::InvalidKey)?);
        }

        if !private.is_empty() {
            let raw = Zeroizing::new(encoding::decode(private).ok_or(CipherError::InvalidKey)?);
            key.private = Some(Self::check_scalar(&raw)?);
        }

        Ok(key)
    }

    /// cs1a key from any suite key by re-reading its encodings.
    pub fn from_key(other: &dyn suite::Key) -> Result<Self> {
        if other.csid() != Csid::CS1A {
            return Err(CipherError::InvalidKey);
        }

        let public = match other.public_bytes() {
            Some(raw) => Some(secp160r1().decompress(&raw).ok_or(CipherError::InvalidKey)?),
            None => None,
        };
        let private = match other.private_bytes() {
            Some(raw) => Some(Self::check_scalar(&raw)?),
            None => None,
        };

        Ok(Self { public, private })
    }

    fn check_scalar(bytes: &[u8]) -> Result<Zeroizing<[u8; SCALAR_BYTES]>> {
        if bytes.len() > SCALAR_BYTES {
            return Err(CipherError::InvalidKey);
        }
        let k = BigUint::from_bytes_be(bytes);
        if k.is_zero() || k >= secp160r1().n {
            return Err(CipherError::InvalidKey);
        }
        let mut out = Zeroizing::new([0u8; SCALAR_BYTES]);
        out[SCALAR_BYTES - bytes.len()..].copy_from_slice(bytes);
        Ok(out)
    }

    pub fn public_point(&self) -> Option<&CurvePoint> {
        self.public.as_ref()
    }

    pub(crate) fn scalar(&self) -> Option<BigUint> {
        self.private
            .as_ref()
            .map(|d| BigUint::from_bytes_be(&d[..]))
    }

    /// ECDH against `peer`'s public point with this key's scalar.
    pub(crate) fn shared_secret(&self, peer: &CurvePoint) -> Option<Zeroizing<Vec<u8>>> {
        let k = self.scalar()?;
        secp160r1().ecdh(peer, &k).map(Zeroizing::new)
    }

    /// Compressed public point.
    pub fn public_encoded(&self) -> Option<[u8; COMPRESSED_LEN]> {
        self.public.as_ref().map(|p| secp160r1().compress(p))
    }
}

impl suite::Key for Key {
    fn csid(&self) -> Csid {
        Csid::CS1A
    }

    fn public_bytes(&self) -> Option<Vec<u8>> {
        self.public_encoded().map(|p| p.to_vec())
    }

    fn private_bytes(&self) -> Option<Zeroizing<Vec<u8>>> {
        self.private.as_ref().map(|d| Zeroizing::new(d.to_vec()))
    }
}

impl PartialEq for Key {
    /// Keys compare by public point.
    fn eq(&self, other: &Self) -> bool {
        self.public == other.public
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(public) = self.public_encoded() {
            f.write_str(&encoding::encode(&public))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("cs1a::Key")
            .field("public", &self.to_string())
            .field("private", &self.private.is_some())
            .finish()
    }
}

/// Fixed-width scalar encoding, for tests and tools.
pub fn scalar_bytes(k: &BigUint) -> Vec<u8> {
    to_fixed_be(k, SCALAR_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::{private_text, Key as _};

    #[test]
    fn test_generate_has_both_components() {
        let key = Key::generate().unwrap();
        assert!(key.can_sign());
        assert!(key.can_encrypt());
        assert_eq!(key.public_bytes().unwrap().len(), 21);
        assert_eq!(key.private_bytes().unwrap().len(), SCALAR_BYTES);
    }

    #[test]
    fn test_text_roundtrip() {
        let key = Key::generate().unwrap();
        let public = key.to_string();
        let private = private_text(&key);

        let decoded = Key::decode(&public, &private).unwrap();
        assert_eq!(decoded, key);
        assert_eq!(decoded.private_bytes(), key.private_bytes());
        assert_eq!(decoded.to_string(), public);
    }

    #[test]
    fn test_partial_keys() {
        let key = Key::generate().unwrap();

        let public_only = Key::decode(&key.to_string(), "").unwrap();
        assert!(public_only.can_encrypt());
        assert!(!public_only.can_sign());

        let private_only = Key::decode("", &private_text(&key)).unwrap();
        assert!(private_only.can_sign());
        assert!(!private_only.can_encrypt());

        let empty = Key::decode("", "").unwrap();
        assert!(!empty.can_sign());
        assert!(!empty.can_encrypt());
        assert_eq!(empty.to_string(), "");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(Key::decode("!!!", ""), Err(CipherError::InvalidKey)));
        assert!(matches!(Key::decode("", "0189"), Err(CipherError::InvalidKey)));
        // valid base-32, but not a point
        assert!(matches!(Key::decode("aaaa", ""), Err(CipherError::InvalidKey)));
    }

    #[test]
    fn test_decode_rejects_out_of_range_scalar() {
        let zero = encoding::encode(&[0u8; SCALAR_BYTES]);
        assert!(matches!(Key::decode("", &zero), Err(CipherError::InvalidKey)));

        let n = encoding::encode(&scalar_bytes(&secp160r1().n));
        assert!(matches!(Key::decode("", &n), Err(CipherError::InvalidKey)));

        let too_long = encoding::encode(&[1u8; SCALAR_BYTES + 1]);
        assert!(matches!(Key::decode("", &too_long), Err(CipherError::InvalidKey)));
    }

    #[test]
    fn test_from_private_bytes_matches_generator_multiple() {
        let key = Key::from_private_bytes(&[2]).unwrap();
        assert_eq!(
            hex::encode(key.public_bytes().unwrap()),
            "0302f997f33c5ed04c55d3edf8675d3e92e8f46686"
        );
        assert_eq!(key.private_bytes().unwrap()[SCALAR_BYTES - 1], 2);
    }

    #[test]
    fn test_from_key_checks_csid() {
        let key = Key::generate().unwrap();
        let copy = Key::from_key(&key).unwrap();
        assert_eq!(copy, key);
        assert!(copy.can_sign());

        let foreign = crate::suite::OpaqueKey::new(Csid(0x3a), key.public_bytes().unwrap());
        assert!(matches!(Key::from_key(&foreign), Err(CipherError::InvalidKey)));
    }
}
