//! e3x cipher sets.
//!
//! This crate provides:
//! - The [`Cipher`], [`Key`] and [`State`] suite abstraction and a
//!   [`Registry`] to hold suites by CSID
//! - Cipher set 1a (secp160r1, AES-128-CTR, HMAC-SHA256, XChaCha20-Poly1305)
//! - Tokens, parts and hashnames
//!
//! # Protocol
//!
//! 1. Each side builds a [`State`] from its long-term key and learns the
//!    peer's key out of band.
//! 2. Each side sends a handshake, a message carrying its long-term key,
//!    its parts and a sequence value, encrypted to the peer with a fresh
//!    line key.
//! 3. Applying the peer's verified [`Handshake`] derives a pair of
//!    directional line keys from the two line keys.
//! 4. Line packets are sealed with those keys and routed by [`Token`].

#![forbid(unsafe_code)]

pub mod cs1a;
pub mod csid;
pub mod encoding;
pub mod error;
pub mod fold;
pub mod hashname;
pub mod parts;
pub mod registry;
pub mod suite;
pub mod token;

pub use cs1a::Cs1a;
pub use csid::{extract_csid, Csid, ParseCsidError};
pub use error::{CipherError, Result};
pub use hashname::Hashname;
pub use parts::{part_for_key, Parts};
pub use registry::Registry;
pub use suite::{Cipher, Handshake, Key, OpaqueKey, Phase, State};
pub use token::Token;
