//! cs1a session state.

use std::fmt;

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};
use zeroize::Zeroizing;

use e3x_lob::Packet;

use super::key::Key;
use super::{apply_keystream, body_key, message_mac, AT_FIELD, IV_LEN, PACKET_NONCE_LEN};
use crate::csid::Csid;
use crate::error::{CipherError, Result};
use crate::parts::Parts;
use crate::suite::{self, Handshake, Key as _, Phase, State};
use crate::token::{Token, TOKEN_LEN};

/// Poly1305 tag appended by the packet seal.
const PACKET_TAG_LEN: usize = 16;

/// Key material between this endpoint and one peer.
///
/// Built with a fresh line key; the peer's keys arrive through
/// [`State::set_remote_key`] and [`State::apply_handshake`], and every
/// derivable secret is derived as soon as its inputs are known.
pub struct Cs1aState {
    local_key: Key,
    remote_key: Option<Key>,
    local_line_key: Key,
    remote_line_key: Option<Key>,
    local_token: Token,
    remote_token: Option<Token>,
    /// `ECDH(remote static, local static)`, the message mac key prefix.
    mac_key_base: Option<Zeroizing<Vec<u8>>>,
    /// Body key for outgoing messages.
    agreed_key: Option<Zeroizing<[u8; 16]>>,
    line_encrypt_key: Option<Zeroizing<[u8; 32]>>,
    line_decrypt_key: Option<Zeroizing<[u8; 32]>>,
    nonce_seed: u32,
    sent_messages: u32,
}

impl Cs1aState {
    /// `local` must hold both components.
    pub fn new(local: Key) -> Result<Self> {
        if !local.can_sign() || !local.can_encrypt() {
            return Err(CipherError::InvalidKey);
        }

        let local_line_key = Key::generate()?;
        let line_public = local_line_key
            .public_encoded()
            .ok_or(CipherError::InvalidKey)?;

        let mut seed = [0u8; IV_LEN];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| CipherError::Entropy(e.to_string()))?;

        Ok(Self {
            local_key: local,
            remote_key: None,
            local_token: Token::from_line_key(&line_public),
            local_line_key,
            remote_line_key: None,
            remote_token: None,
            mac_key_base: None,
            agreed_key: None,
            line_encrypt_key: None,
            line_decrypt_key: None,
            nonce_seed: u32::from_be_bytes(seed),
            sent_messages: 0,
        })
    }

    fn derive(&mut self) {
        if self.mac_key_base.is_none() {
            if let Some(point) = self.remote_key.as_ref().and_then(Key::public_point) {
                self.mac_key_base = self.local_key.shared_secret(point);
                self.agreed_key = self
                    .local_line_key
                    .shared_secret(point)
                    .map(|shared| body_key(&shared));
            }
        }

        let Some(remote_line) = &self.remote_line_key else {
            return;
        };

        if self.remote_token.is_none() {
            if let Some(public) = remote_line.public_encoded() {
                self.remote_token = Some(Token::from_line_key(&public));
            }
        }

        if self.line_encrypt_key.is_some() {
            return;
        }
        let (Some(remote_token), Some(point)) = (self.remote_token, remote_line.public_point())
        else {
            return;
        };
        let Some(shared) = self.local_line_key.shared_secret(point) else {
            debug!("line key agreement produced the point at infinity");
            return;
        };

        self.line_encrypt_key = Some(line_key(&shared, &self.local_token, &remote_token));
        self.line_decrypt_key = Some(line_key(&shared, &remote_token, &self.local_token));
        trace!(
            "line keys derived: local token {}, remote token {}",
            self.local_token,
            remote_token
        );
    }

    fn next_iv(&mut self) -> Result<[u8; IV_LEN]> {
        let count = self.sent_messages;
        self.sent_messages = count.checked_add(1).ok_or(CipherError::InvalidState)?;
        Ok(self.nonce_seed.wrapping_add(count).to_be_bytes())
    }

    fn packet_cipher(key: &[u8; 32]) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(key))
    }
}

/// `SHA256(shared ‖ first ‖ second)`
fn line_key(shared: &[u8], first: &Token, second: &Token) -> Zeroizing<[u8; 32]> {
    let digest = Sha256::new()
        .chain_update(shared)
        .chain_update(first.as_bytes())
        .chain_update(second.as_bytes())
        .finalize();
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&digest);
    key
}

impl State for Cs1aState {
    fn csid(&self) -> Csid {
        Csid::CS1A
    }

    fn phase(&self) -> Phase {
        if self.line_encrypt_key.is_some() {
            Phase::LineKeysDerived
        } else if self.remote_line_key.is_some() {
            Phase::RemoteLineKeyKnown
        } else if self.remote_key.is_some() {
            Phase::RemoteKeyKnown
        } else {
            Phase::Bare
        }
    }

    fn is_high(&self) -> bool {
        let remote = self.remote_key.as_ref().and_then(Key::public_point);
        match (self.local_key.public_point(), remote) {
            (Some(local), Some(remote)) => local.x > remote.x,
            _ => false,
        }
    }

    fn local_token(&self) -> Option<Token> {
        Some(self.local_token)
    }

    fn remote_token(&self) -> Option<Token> {
        self.remote_token
    }

    fn set_remote_key(&mut self, key: &dyn suite::Key) -> Result<()> {
        if !key.can_encrypt() {
            return Err(CipherError::InvalidKey);
        }
        let key = Key::from_key(key)?;

        match &self.remote_key {
            Some(current) if *current == key => return Ok(()),
            Some(_) => return Err(CipherError::InvalidState),
            None => {}
        }

        self.remote_key = Some(key);
        self.derive();
        Ok(())
    }

    fn encrypt_message(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let line_public = self
            .local_line_key
            .public_encoded()
            .ok_or(CipherError::InvalidState)?;
        if self.phase() < Phase::RemoteKeyKnown {
            return Err(CipherError::InvalidState);
        }
        let iv = self.next_iv()?;

        let (Some(agreed), Some(mac_key_base)) = (&self.agreed_key, &self.mac_key_base) else {
            return Err(CipherError::InvalidState);
        };

        let mut out = Vec::with_capacity(super::MIN_MESSAGE_LEN + plaintext.len());
        out.extend_from_slice(&line_public);
        out.extend_from_slice(&iv);
        let body_start = out.len();
        out.extend_from_slice(plaintext);
        apply_keystream(agreed, &iv, &mut out[body_start..]);

        let mac = message_mac(mac_key_base, &iv, &out)?;
        out.extend_from_slice(&mac);
        Ok(out)
    }

    fn encrypt_handshake(&mut self, at: u32, parts: &Parts) -> Result<Vec<u8>> {
        if !self.can_encrypt_handshake() {
            return Err(CipherError::InvalidState);
        }
        let public = self
            .local_key
            .public_encoded()
            .ok_or(CipherError::InvalidState)?;

        let mut inner = Packet::new(public.to_vec());
        parts.apply_to_header(inner.header_mut());
        inner.header_mut().set(AT_FIELD, at);
        let encoded = inner.encode()?;

        self.encrypt_message(&encoded)
    }

    fn apply_handshake(&mut self, handshake: Handshake) -> bool {
        if handshake.csid != Csid::CS1A {
            return false;
        }
        let (Ok(remote_key), Ok(remote_line_key)) = (
            Key::from_key(handshake.remote_key.as_ref()),
            Key::from_key(handshake.remote_line_key.as_ref()),
        ) else {
            return false;
        };
        if remote_key.public_point().is_none() || remote_line_key.public_point().is_none() {
            return false;
        }

        if matches!(&self.remote_line_key, Some(current) if *current != remote_line_key) {
            debug!("handshake rejected: line key changed");
            return false;
        }
        if matches!(&self.remote_key, Some(current) if *current != remote_key) {
            debug!("handshake rejected: remote key changed");
            return false;
        }

        self.remote_line_key = Some(remote_line_key);
        self.remote_key = Some(remote_key);
        self.derive();
        true
    }

    fn encrypt_packet(&self, packet: &Packet) -> Result<Packet> {
        let key = self
            .line_encrypt_key
            .as_ref()
            .ok_or(CipherError::InvalidState)?;
        let inner = packet.encode()?;

        let mut nonce = [0u8; PACKET_NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| CipherError::Entropy(e.to_string()))?;

        let sealed = Self::packet_cipher(key)
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: &inner,
                    aad: self.local_token.as_bytes(),
                },
            )
            .map_err(|_| CipherError::InvalidPacket)?;

        let mut body = Vec::with_capacity(TOKEN_LEN + PACKET_NONCE_LEN + sealed.len());
        body.extend_from_slice(self.local_token.as_bytes());
        body.extend_from_slice(&nonce);
        body.extend_from_slice(&sealed);
        Ok(Packet::new(body))
    }

    fn decrypt_packet(&self, packet: &Packet) -> Result<Packet> {
        let (Some(key), Some(remote_token)) = (&self.line_decrypt_key, self.remote_token) else {
            return Err(CipherError::InvalidState);
        };

        if !packet.header().is_empty() {
            return Err(CipherError::InvalidPacket);
        }
        let body = packet.body();
        if body.len() < TOKEN_LEN + PACKET_NONCE_LEN + PACKET_TAG_LEN {
            return Err(CipherError::InvalidPacket);
        }

        let (token, rest) = body.split_at(TOKEN_LEN);
        let (nonce, sealed) = rest.split_at(PACKET_NONCE_LEN);

        let token = Token::from_slice(token).ok_or(CipherError::InvalidPacket)?;
        if token != remote_token {
            debug!("packet dropped: token {} does not match {}", token, remote_token);
            return Err(CipherError::InvalidPacket);
        }

        let inner = Self::packet_cipher(key)
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: token.as_bytes(),
                },
            )
            .map_err(|_| {
                debug!("packet dropped: seal check failed for token {}", token);
                CipherError::InvalidPacket
            })?;

        Packet::decode(&inner).map_err(|_| CipherError::InvalidPacket)
    }
}

impl fmt::Debug for Cs1aState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cs1aState")
            .field("phase", &self.phase())
            .field("local_token", &self.local_token)
            .field("remote_token", &self.remote_token)
            .field("remote_key", &self.remote_key)
            .finish_non_exhaustive()
    }
}
