//! The cipher suite abstraction.
//!
//! A suite is identified by its [`Csid`] and provides key handling,
//! handshake decryption and per-peer session [`State`]. Suites are used
//! through trait objects so a [`Registry`](crate::Registry) can hold any
//! mix of them.

use std::fmt;

use zeroize::Zeroizing;

use e3x_lob::Packet;

use crate::csid::Csid;
use crate::encoding;
use crate::error::Result;
use crate::parts::Parts;
use crate::token::Token;

/// A suite's public and/or private key.
pub trait Key: Send + Sync + fmt::Debug {
    fn csid(&self) -> Csid;

    /// Wire encoding of the public component.
    fn public_bytes(&self) -> Option<Vec<u8>>;

    /// Wire encoding of the private component.
    fn private_bytes(&self) -> Option<Zeroizing<Vec<u8>>>;

    /// True when the private component is present.
    fn can_sign(&self) -> bool {
        self.private_bytes().is_some()
    }

    /// True when the public component is present.
    fn can_encrypt(&self) -> bool {
        self.public_bytes().is_some()
    }
}

impl fmt::Display for dyn Key + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.public_bytes() {
            Some(public) => f.write_str(&encoding::encode(&public)),
            None => Ok(()),
        }
    }
}

/// Same suite and same public component.
pub fn same_public_key(a: &dyn Key, b: &dyn Key) -> bool {
    a.csid() == b.csid() && a.public_bytes() == b.public_bytes()
}

/// Base-32 text of a key's private component, or an empty string.
pub fn private_text(key: &dyn Key) -> Zeroizing<String> {
    Zeroizing::new(
        key.private_bytes()
            .map(|private| encoding::encode(&private))
            .unwrap_or_default(),
    )
}

/// Raw key of a suite this process does not implement.
///
/// Keeps the decoded bytes so they can be stored and forwarded.
#[derive(Clone, PartialEq, Eq)]
pub struct OpaqueKey {
    csid: Csid,
    public: Vec<u8>,
}

impl OpaqueKey {
    pub fn new(csid: Csid, public: Vec<u8>) -> Self {
        Self { csid, public }
    }
}

impl Key for OpaqueKey {
    fn csid(&self) -> Csid {
        self.csid
    }

    fn public_bytes(&self) -> Option<Vec<u8>> {
        Some(self.public.clone())
    }

    fn private_bytes(&self) -> Option<Zeroizing<Vec<u8>>> {
        None
    }
}

impl fmt::Debug for OpaqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueKey({}, {})", self.csid, encoding::encode(&self.public))
    }
}

/// A verified handshake from a peer.
///
/// Only produced by [`Cipher::decrypt_handshake`]. Applying it to a
/// session state consumes it.
#[derive(Debug)]
pub struct Handshake {
    pub csid: Csid,
    /// Sender's long-term key.
    pub remote_key: Box<dyn Key>,
    /// Sender's ephemeral line key.
    pub remote_line_key: Box<dyn Key>,
    pub parts: Parts,
    /// Sender-chosen sequence value.
    pub at: u32,
}

/// Session progress. Each phase implies the previous ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Only local keys are known.
    Bare,
    /// The peer's long-term key is known; messages can be encrypted.
    RemoteKeyKnown,
    /// The peer's line key is known.
    RemoteLineKeyKnown,
    /// Line keys are derived; packets can be exchanged.
    LineKeysDerived,
}

/// Per-peer session state of one suite.
pub trait State: Send + fmt::Debug {
    fn csid(&self) -> Csid;

    fn phase(&self) -> Phase;

    /// Deterministic tie-break between the two peers.
    fn is_high(&self) -> bool;

    /// Token peers use to address packets to this side.
    fn local_token(&self) -> Option<Token>;

    /// Token this side stamps on packets it expects from the peer.
    fn remote_token(&self) -> Option<Token>;

    fn set_remote_key(&mut self, key: &dyn Key) -> Result<()>;

    fn encrypt_message(&mut self, plaintext: &[u8]) -> Result<Vec<u8>>;

    fn encrypt_handshake(&mut self, at: u32, parts: &Parts) -> Result<Vec<u8>>;

    /// Adopt the peer's keys from a verified handshake.
    ///
    /// Returns `false`, leaving the state untouched, when the handshake is
    /// for another suite or names keys that differ from the ones already
    /// known.
    fn apply_handshake(&mut self, handshake: Handshake) -> bool;

    fn encrypt_packet(&self, packet: &Packet) -> Result<Packet>;

    fn decrypt_packet(&self, packet: &Packet) -> Result<Packet>;

    fn needs_remote_key(&self) -> bool {
        self.phase() == Phase::Bare
    }

    fn can_encrypt_message(&self) -> bool {
        self.phase() >= Phase::RemoteKeyKnown
    }

    fn can_encrypt_handshake(&self) -> bool {
        self.can_encrypt_message()
    }

    fn can_decrypt_message(&self) -> bool {
        self.phase() >= Phase::RemoteKeyKnown
    }

    /// The local private key is always present, so handshakes can be read
    /// from the start.
    fn can_decrypt_handshake(&self) -> bool {
        true
    }

    fn can_encrypt_packet(&self) -> bool {
        self.phase() == Phase::LineKeysDerived
    }

    fn can_decrypt_packet(&self) -> bool {
        self.phase() == Phase::LineKeysDerived
    }
}

/// A cipher suite.
pub trait Cipher: Send + Sync {
    fn csid(&self) -> Csid;

    /// Fresh key pair from the OS entropy source.
    fn generate_key(&self) -> Result<Box<dyn Key>>;

    /// Key from base-32 text. An empty string means the component is absent.
    fn decode_key(&self, public: &str, private: &str) -> Result<Box<dyn Key>>;

    /// Session state for `local`, which must hold both components.
    fn new_state(&self, local: &dyn Key) -> Result<Box<dyn State>>;

    /// Decrypt and verify a handshake addressed to `local`.
    fn decrypt_handshake(&self, local: &dyn Key, data: &[u8]) -> Result<Handshake>;

    /// Decrypt and verify a message from a known `remote` key.
    fn decrypt_message(&self, local: &dyn Key, remote: &dyn Key, data: &[u8]) -> Result<Vec<u8>>;
}
