//! Cipher set errors.

use thiserror::Error;

use crate::csid::Csid;

/// Errors produced by cipher suites and session states.
///
/// `InvalidMessage` and `InvalidPacket` are caused by network input and are
/// expected: callers drop the datagram and move on.
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("unknown CSID {0}")]
    UnknownCsid(Csid),

    #[error("CSID {0} is already registered")]
    DuplicateCsid(Csid),

    #[error("invalid key")]
    InvalidKey,

    #[error("invalid state")]
    InvalidState,

    #[error("invalid message")]
    InvalidMessage,

    #[error("invalid packet")]
    InvalidPacket,

    #[error("entropy source failed: {0}")]
    Entropy(String),

    #[error("lob error: {0}")]
    Lob(#[from] e3x_lob::LobError),
}

pub type Result<T, E = CipherError> = std::result::Result<T, E>;
