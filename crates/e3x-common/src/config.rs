//! Identity files.
//!
//! An identity is stored as JSON:
//!
//! ```json
//! {
//!   "hashname": "<52 chars>",
//!   "parts": { "1a": "<52 chars>" },
//!   "keys": { "1a": { "pub": "<base32>", "prv": "<base32>" } }
//! }
//! ```
//!
//! Keys are keyed by two-digit lowercase hex CSID. The private component is
//! optional so the same format can describe a peer.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Base-32 text of one key pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyPairText {
    #[serde(rename = "pub")]
    pub public: String,

    #[serde(rename = "prv", default, skip_serializing_if = "String::is_empty")]
    pub private: String,
}

impl KeyPairText {
    pub fn new(public: impl Into<String>, private: impl Into<String>) -> Self {
        Self {
            public: public.into(),
            private: private.into(),
        }
    }
}

impl fmt::Debug for KeyPairText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPairText")
            .field("public", &self.public)
            .field("private", &if self.private.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

/// A stored endpoint identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityFile {
    pub hashname: String,

    #[serde(default)]
    pub parts: BTreeMap<String, String>,

    #[serde(default)]
    pub keys: BTreeMap<String, KeyPairText>,
}

impl IdentityFile {
    /// Parse and validate an identity from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let identity: IdentityFile = serde_json::from_str(text)?;
        identity.validate()?;
        Ok(identity)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load an identity file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
    }

    /// Save to `path`.
    ///
    /// The file holds private keys, so it is written with restricted
    /// permissions (0600 on Unix).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    /// True when at least one key carries its private component.
    pub fn has_private_keys(&self) -> bool {
        self.keys.values().any(|k| !k.private.is_empty())
    }

    fn validate(&self) -> Result<()> {
        for csid in self.parts.keys().chain(self.keys.keys()) {
            if !is_csid_text(csid) {
                return Err(Error::config(format!("invalid CSID {:?}", csid)));
            }
        }
        if let Some((csid, _)) = self.keys.iter().find(|(_, k)| k.public.is_empty()) {
            return Err(Error::config(format!("key {} has no public component", csid)));
        }
        Ok(())
    }
}

fn is_csid_text(s: &str) -> bool {
    s.len() == 2 && s.bytes().all(|c| matches!(c, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn sample() -> IdentityFile {
        let mut identity = IdentityFile {
            hashname: "a".repeat(52),
            ..Default::default()
        };
        identity.parts.insert("1a".into(), "b".repeat(52));
        identity
            .keys
            .insert("1a".into(), KeyPairText::new("publictext", "privatetext"));
        identity
    }

    fn temp_path() -> std::path::PathBuf {
        let suffix: u64 = rand::thread_rng().gen();
        std::env::temp_dir().join(format!("e3x-identity-{:016x}.json", suffix))
    }

    #[test]
    fn test_json_field_names() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["keys"]["1a"]["pub"], "publictext");
        assert_eq!(value["keys"]["1a"]["prv"], "privatetext");
        assert_eq!(value["parts"]["1a"], "b".repeat(52));
    }

    #[test]
    fn test_public_only_key_omits_prv() {
        let mut identity = sample();
        identity
            .keys
            .insert("1a".into(), KeyPairText::new("publictext", ""));
        let json = identity.to_json().unwrap();
        assert!(!json.contains("prv"));
        assert!(!identity.has_private_keys());

        let parsed = IdentityFile::from_json(&json).unwrap();
        assert_eq!(parsed, identity);
    }

    #[test]
    fn test_rejects_bad_csid() {
        let json = r#"{"hashname":"x","parts":{"zz":"y"}}"#;
        assert!(matches!(IdentityFile::from_json(json), Err(Error::Config(_))));

        let json = r#"{"hashname":"x","parts":{"1A":"y"}}"#;
        assert!(matches!(IdentityFile::from_json(json), Err(Error::Config(_))));

        let json = r#"{"hashname":"x","keys":{"1a":{"pub":""}}}"#;
        assert!(matches!(IdentityFile::from_json(json), Err(Error::Config(_))));

        assert!(matches!(
            IdentityFile::from_json("not json"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let text = format!("{:?}", sample());
        assert!(text.contains("publictext"));
        assert!(!text.contains("privatetext"));
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path();
        let identity = sample();
        identity.save(&path).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let loaded = IdentityFile::load(&path).unwrap();
        assert_eq!(loaded, identity);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(IdentityFile::load(temp_path()), Err(Error::Io(_))));
    }
}
