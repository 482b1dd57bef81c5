//! Suite registry.

use std::collections::BTreeMap;

use tracing::debug;

use crate::cs1a::Cs1a;
use crate::csid::Csid;
use crate::encoding;
use crate::error::{CipherError, Result};
use crate::parts::Parts;
use crate::suite::{Cipher, Handshake, Key, OpaqueKey, State};

/// The cipher suites available to an endpoint, keyed by CSID.
///
/// Built once at startup and then shared read-only.
#[derive(Default)]
pub struct Registry {
    suites: BTreeMap<Csid, Box<dyn Cipher>>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every suite this crate implements.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.suites.insert(Csid::CS1A, Box::new(Cs1a));
        registry
    }

    /// Add a suite under its own CSID.
    pub fn register(&mut self, suite: Box<dyn Cipher>) -> Result<()> {
        let csid = suite.csid();
        if self.suites.contains_key(&csid) {
            return Err(CipherError::DuplicateCsid(csid));
        }
        self.suites.insert(csid, suite);
        Ok(())
    }

    pub fn lookup(&self, csid: Csid) -> Option<&dyn Cipher> {
        self.suites.get(&csid).map(|s| s.as_ref())
    }

    /// Registered CSIDs, ascending.
    pub fn csids(&self) -> impl Iterator<Item = Csid> + '_ {
        self.suites.keys().copied()
    }

    fn suite(&self, csid: Csid) -> Result<&dyn Cipher> {
        self.lookup(csid).ok_or(CipherError::UnknownCsid(csid))
    }

    pub fn generate_key(&self, csid: Csid) -> Result<Box<dyn Key>> {
        self.suite(csid)?.generate_key()
    }

    /// Decode a key for `csid`.
    ///
    /// Public keys of unregistered suites are kept as [`OpaqueKey`]s so
    /// they can still be stored and forwarded.
    pub fn decode_key(&self, csid: Csid, public: &str, private: &str) -> Result<Box<dyn Key>> {
        if let Some(suite) = self.lookup(csid) {
            return suite.decode_key(public, private);
        }

        let raw = encoding::decode(public)
            .filter(|raw| !raw.is_empty())
            .ok_or(CipherError::InvalidKey)?;
        debug!("keeping opaque key for unregistered CSID {}", csid);
        Ok(Box::new(OpaqueKey::new(csid, raw)))
    }

    /// Session state for the suite of `local`.
    pub fn new_state(&self, local: &dyn Key) -> Result<Box<dyn State>> {
        self.suite(local.csid())?.new_state(local)
    }

    /// Decrypt a handshake with the suite of `local`.
    pub fn decrypt_handshake(&self, local: &dyn Key, data: &[u8]) -> Result<Handshake> {
        self.suite(local.csid())?.decrypt_handshake(local, data)
    }

    /// Highest CSID that is registered here and advertised in `remote`.
    pub fn select(&self, remote: &Parts) -> Option<Csid> {
        self.csids().filter(|csid| remote.contains(*csid)).max()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.suites.keys()).finish()
    }
}
