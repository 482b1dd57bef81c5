//! Conversion between identity files and live keys.

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use e3x_cipherset::suite::private_text;
use e3x_cipherset::{Csid, Hashname, Key, Parts, Registry};
use e3x_common::{IdentityFile, KeyPairText};

/// An endpoint's keys together with the parts they advertise.
pub struct Identity {
    pub keys: Vec<Box<dyn Key>>,
    pub parts: Parts,
}

impl Identity {
    /// Fresh keys for every registered suite.
    pub fn generate(registry: &Registry) -> Result<Self> {
        let keys = registry
            .csids()
            .map(|csid| {
                registry
                    .generate_key(csid)
                    .with_context(|| format!("generating key for CSID {}", csid))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_keys(keys))
    }

    /// Decode every key in `file`.
    pub fn from_file(registry: &Registry, file: &IdentityFile) -> Result<Self> {
        let mut keys = Vec::with_capacity(file.keys.len());
        for (csid, pair) in &file.keys {
            let csid: Csid = csid.parse()?;
            let key = registry
                .decode_key(csid, &pair.public, &pair.private)
                .with_context(|| format!("decoding key {}", csid))?;
            debug!(%csid, can_sign = key.can_sign(), "loaded key");
            keys.push(key);
        }
        Ok(Self::from_keys(keys))
    }

    fn from_keys(keys: Vec<Box<dyn Key>>) -> Self {
        let parts = Parts::from_keys(keys.iter().map(|k| k.as_ref() as &dyn Key));
        Self { keys, parts }
    }

    pub fn hashname(&self) -> Result<Hashname> {
        self.parts
            .to_hashname()
            .ok_or_else(|| anyhow!("identity has no usable parts"))
    }

    /// Key for `csid`, if this identity holds one.
    pub fn key(&self, csid: Csid) -> Option<&dyn Key> {
        self.keys
            .iter()
            .find(|k| k.csid() == csid)
            .map(|k| k.as_ref())
    }

    pub fn to_file(&self) -> Result<IdentityFile> {
        let mut file = IdentityFile {
            hashname: self.hashname()?.to_string(),
            ..Default::default()
        };
        for (csid, part) in self.parts.iter() {
            file.parts.insert(csid.to_string(), part.to_string());
        }
        for key in &self.keys {
            let private = private_text(key.as_ref());
            file.keys.insert(
                key.csid().to_string(),
                KeyPairText::new(key.as_ref().to_string(), private.as_str()),
            );
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_identity_survives_file_roundtrip() {
        let registry = Registry::with_defaults();
        let identity = Identity::generate(&registry).unwrap();
        let file = identity.to_file().unwrap();

        assert_eq!(file.hashname.len(), 52);
        assert!(file.keys.contains_key("1a"));
        assert!(file.has_private_keys());

        let json = file.to_json().unwrap();
        let reloaded = IdentityFile::from_json(&json).unwrap();
        let restored = Identity::from_file(&registry, &reloaded).unwrap();

        assert_eq!(restored.parts, identity.parts);
        assert_eq!(restored.hashname().unwrap().as_str(), file.hashname);
        assert!(restored.key(Csid::CS1A).unwrap().can_sign());
    }

    #[test]
    fn test_bad_key_text_is_reported() {
        let registry = Registry::with_defaults();
        let mut file = IdentityFile::default();
        file.keys
            .insert("1a".into(), KeyPairText::new("not base32!", ""));
        assert!(Identity::from_file(&registry, &file).is_err());
    }

    #[test]
    fn test_empty_identity_has_no_hashname() {
        let registry = Registry::with_defaults();
        let identity = Identity::from_file(&registry, &IdentityFile::default()).unwrap();
        assert!(identity.hashname().is_err());
        assert!(identity.key(Csid::CS1A).is_none());
    }
}
