//! Cipher set 1a: secp160r1 ECDH, AES-128-CTR message bodies, folded
//! HMAC-SHA256 authentication, XChaCha20-Poly1305 line packets.
//!
//! Message layout (handshakes are messages whose plaintext is a LOB packet):
//!
//! ```text
//! [21 bytes: sender line key] [4 bytes: iv] [ciphertext] [4 bytes: mac]
//! ```
//!
//! Line packet body:
//!
//! ```text
//! [16 bytes: sender token] [24 bytes: nonce] [sealed inner LOB + 16-byte tag]
//! ```

mod curve;
mod key;
mod state;

pub use curve::{secp160r1, CurvePoint, COMPRESSED_LEN, SCALAR_BYTES};
pub use key::{scalar_bytes, Key};
pub use state::Cs1aState;

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::Zeroizing;

use e3x_lob::Packet;

use crate::csid::Csid;
use crate::error::{CipherError, Result};
use crate::fold::fold;
use crate::parts::Parts;
use crate::suite::{self, Cipher, Handshake, State};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type HmacSha256 = Hmac<Sha256>;

/// Message IV width.
pub const IV_LEN: usize = 4;

/// Folded HMAC width.
pub const MAC_LEN: usize = 4;

/// Line packet nonce width (XChaCha20).
pub const PACKET_NONCE_LEN: usize = 24;

/// Smallest well-formed message: line key, iv and mac around an empty body.
pub const MIN_MESSAGE_LEN: usize = COMPRESSED_LEN + IV_LEN + MAC_LEN;

/// Handshake header carrying the sender's sequence value.
pub(crate) const AT_FIELD: &str = "at";

/// The cs1a suite.
#[derive(Debug, Default, Clone, Copy)]
pub struct Cs1a;

impl Cipher for Cs1a {
    fn csid(&self) -> Csid {
        Csid::CS1A
    }

    fn generate_key(&self) -> Result<Box<dyn suite::Key>> {
        Ok(Box::new(Key::generate()?))
    }

    fn decode_key(&self, public: &str, private: &str) -> Result<Box<dyn suite::Key>> {
        Ok(Box::new(Key::decode(public, private)?))
    }

    fn new_state(&self, local: &dyn suite::Key) -> Result<Box<dyn State>> {
        Ok(Box::new(Cs1aState::new(Key::from_key(local)?)?))
    }

    fn decrypt_handshake(&self, local: &dyn suite::Key, data: &[u8]) -> Result<Handshake> {
        let local = Key::from_key(local)?;
        if local.scalar().is_none() {
            return Err(CipherError::InvalidKey);
        }

        let message = SplitMessage::parse(data)?;
        let (line_key, plaintext) = open_body(&local, &message)?;

        let mut inner = Packet::decode(&plaintext).map_err(|e| {
            debug!("handshake inner packet rejected: {}", e);
            CipherError::InvalidMessage
        })?;

        let at = inner
            .header()
            .get_u32(AT_FIELD)
            .ok_or(CipherError::InvalidMessage)?;
        if inner.body().len() != COMPRESSED_LEN {
            return Err(CipherError::InvalidMessage);
        }
        let remote_key =
            Key::from_public_bytes(inner.body()).map_err(|_| CipherError::InvalidMessage)?;

        inner.header_mut().remove(AT_FIELD);
        let parts = Parts::from_header(inner.header()).ok_or(CipherError::InvalidMessage)?;

        verify_mac(&local, &remote_key, &message)?;

        Ok(Handshake {
            csid: Csid::CS1A,
            remote_key: Box::new(remote_key),
            remote_line_key: Box::new(line_key),
            parts,
            at,
        })
    }

    fn decrypt_message(
        &self,
        local: &dyn suite::Key,
        remote: &dyn suite::Key,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        let local = Key::from_key(local)?;
        let remote = Key::from_key(remote)?;
        if local.scalar().is_none() || remote.public_point().is_none() {
            return Err(CipherError::InvalidState);
        }

        let message = SplitMessage::parse(data)?;
        verify_mac(&local, &remote, &message)?;
        let (_, plaintext) = open_body(&local, &message)?;
        Ok(plaintext)
    }
}

/// A message split into its wire fields.
struct SplitMessage<'a> {
    line_key: &'a [u8],
    iv: [u8; IV_LEN],
    ciphertext: &'a [u8],
    mac: &'a [u8],
    /// Everything the mac covers.
    signed: &'a [u8],
}

impl<'a> SplitMessage<'a> {
    fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < MIN_MESSAGE_LEN {
            return Err(CipherError::InvalidMessage);
        }

        let (signed, mac) = data.split_at(data.len() - MAC_LEN);
        let (line_key, rest) = signed.split_at(COMPRESSED_LEN);
        let (iv, ciphertext) = rest.split_at(IV_LEN);

        let mut iv_bytes = [0u8; IV_LEN];
        iv_bytes.copy_from_slice(iv);

        Ok(Self {
            line_key,
            iv: iv_bytes,
            ciphertext,
            mac,
            signed,
        })
    }
}

/// Decrypt the body with the key agreed between the sender's line key and
/// `local`'s static key. Returns the sender's line key with the plaintext.
fn open_body(local: &Key, message: &SplitMessage<'_>) -> Result<(Key, Vec<u8>)> {
    let line_key =
        Key::from_public_bytes(message.line_key).map_err(|_| CipherError::InvalidMessage)?;
    let line_point = line_key.public_point().ok_or(CipherError::InvalidMessage)?;
    let shared = local
        .shared_secret(line_point)
        .ok_or(CipherError::InvalidMessage)?;

    let key = body_key(&shared);
    let mut plaintext = message.ciphertext.to_vec();
    apply_keystream(&key, &message.iv, &mut plaintext);
    Ok((line_key, plaintext))
}

/// Check the mac with `ECDH(remote static, local static) ‖ iv` as key.
fn verify_mac(local: &Key, remote: &Key, message: &SplitMessage<'_>) -> Result<()> {
    let remote_point = remote.public_point().ok_or(CipherError::InvalidMessage)?;
    let mac_key_base = local
        .shared_secret(remote_point)
        .ok_or(CipherError::InvalidMessage)?;

    let expected = message_mac(&mac_key_base, &message.iv, message.signed)?;
    if bool::from(expected[..].ct_eq(message.mac)) {
        Ok(())
    } else {
        debug!("message mac mismatch");
        Err(CipherError::InvalidMessage)
    }
}

/// `fold(SHA256(shared), 16)`
pub(crate) fn body_key(shared: &[u8]) -> Zeroizing<[u8; 16]> {
    let folded = Zeroizing::new(fold(&Sha256::digest(shared), 16));
    let mut key = Zeroizing::new([0u8; 16]);
    key.copy_from_slice(&folded);
    key
}

/// AES-128-CTR with a counter block of `iv ‖ 0^12`.
pub(crate) fn apply_keystream(key: &[u8; 16], iv: &[u8; IV_LEN], data: &mut [u8]) {
    let mut counter = [0u8; 16];
    counter[..IV_LEN].copy_from_slice(iv);
    let mut cipher = Aes128Ctr::new(key.into(), &counter.into());
    cipher.apply_keystream(data);
}

/// `fold(HMAC-SHA256(mac_key_base ‖ iv, signed), 4)`
pub(crate) fn message_mac(
    mac_key_base: &[u8],
    iv: &[u8; IV_LEN],
    signed: &[u8],
) -> Result<[u8; MAC_LEN]> {
    let mut mac_key = Zeroizing::new(Vec::with_capacity(mac_key_base.len() + IV_LEN));
    mac_key.extend_from_slice(mac_key_base);
    mac_key.extend_from_slice(iv);

    let mut mac = <HmacSha256 as Mac>::new_from_slice(&mac_key)
        .map_err(|_| CipherError::InvalidState)?;
    mac.update(signed);
    let folded = fold(&mac.finalize().into_bytes(), MAC_LEN);

    let mut out = [0u8; MAC_LEN];
    out.copy_from_slice(&folded);
    Ok(out)
}
