//! Parts: the per-suite public key fingerprints an endpoint advertises.

use sha2::{Digest, Sha256};

use e3x_lob::Header;

use crate::csid::Csid;
use crate::encoding;
use crate::hashname::{Hashname, HASHNAME_LEN};
use crate::suite::Key;

/// Fingerprint of a public key: `base32(SHA256(public))`.
pub fn part_for_key(public: &[u8]) -> String {
    encoding::encode(&Sha256::digest(public))
}

/// Ordered CSID → fingerprint mapping.
///
/// Iteration follows insertion order. Each CSID appears once; inserting it
/// again replaces the value in place. Two `Parts` are equal when they map
/// the same CSIDs to the same values, regardless of order.
#[derive(Debug, Clone, Default)]
pub struct Parts {
    entries: Vec<(Csid, String)>,
}

impl Parts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parts advertising the public component of each key.
    ///
    /// Keys without a public component are skipped.
    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a dyn Key>) -> Self {
        keys.into_iter()
            .filter_map(|key| Some((key.csid(), part_for_key(&key.public_bytes()?))))
            .collect()
    }

    /// Insert or replace the fingerprint for `csid`.
    pub fn insert(&mut self, csid: Csid, part: impl Into<String>) {
        let part = part.into();
        match self.entries.iter_mut().find(|(c, _)| *c == csid) {
            Some(entry) => entry.1 = part,
            None => self.entries.push((csid, part)),
        }
    }

    pub fn get(&self, csid: Csid) -> Option<&str> {
        self.entries
            .iter()
            .find(|(c, _)| *c == csid)
            .map(|(_, p)| p.as_str())
    }

    pub fn contains(&self, csid: Csid) -> bool {
        self.get(csid).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Csid, &str)> {
        self.entries.iter().map(|(c, p)| (*c, p.as_str()))
    }

    pub fn csids(&self) -> impl Iterator<Item = Csid> + '_ {
        self.entries.iter().map(|(c, _)| *c)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read parts from header fields keyed by two-digit hex CSIDs.
    ///
    /// Returns `None` if any field key is not two lowercase hex digits, if a
    /// CSID appears twice, or if a value is not a non-empty string.
    pub fn from_header(header: &Header) -> Option<Self> {
        let mut parts = Parts::new();
        for (key, value) in header.fields() {
            let csid: Csid = key.parse().ok()?;
            let part = value.as_str().filter(|s| !s.is_empty())?;
            if parts.contains(csid) {
                return None;
            }
            parts.insert(csid, part);
        }
        Some(parts)
    }

    /// Write every part into `header` as `"<csid hex>": "<part>"`.
    pub fn apply_to_header(&self, header: &mut Header) {
        for (csid, part) in self.iter() {
            header.set(csid.to_string(), part);
        }
    }

    /// Roll the parts up into a hashname.
    ///
    /// For each CSID in ascending order: `r = SHA256(r ‖ csid)`, then
    /// `r = SHA256(r ‖ base32decode(part))`, starting from an empty `r`.
    /// Returns `None` for empty parts, or when a part is not a 52-character
    /// base-32 string.
    pub fn to_hashname(&self) -> Option<Hashname> {
        if self.entries.is_empty() {
            return None;
        }

        let mut sorted: Vec<_> = self.entries.iter().collect();
        sorted.sort_by_key(|(csid, _)| *csid);

        let mut rollup: Vec<u8> = Vec::new();
        for (csid, part) in sorted {
            if part.len() != HASHNAME_LEN {
                return None;
            }
            let raw = encoding::decode(part)?;

            rollup = Sha256::new()
                .chain_update(&rollup)
                .chain_update([csid.0])
                .finalize()
                .to_vec();
            rollup = Sha256::new()
                .chain_update(&rollup)
                .chain_update(&raw)
                .finalize()
                .to_vec();
        }

        let bytes: [u8; 32] = rollup.try_into().ok()?;
        Some(Hashname::from_bytes(&bytes))
    }
}

impl PartialEq for Parts {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(csid, part)| other.get(csid) == Some(part))
    }
}

impl Eq for Parts {}

impl FromIterator<(Csid, String)> for Parts {
    fn from_iter<I: IntoIterator<Item = (Csid, String)>>(iter: I) -> Self {
        let mut parts = Parts::new();
        for (csid, part) in iter {
            parts.insert(csid, part);
        }
        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part_of_encoded_key(key: &str) -> String {
        part_for_key(&encoding::decode(key).unwrap())
    }

    #[test]
    fn test_hashname_single_part() {
        let mut parts = Parts::new();
        parts.insert(
            Csid(0x3a),
            part_of_encoded_key("hp6yglmmqwcbw5hno37uauh6fn6dx5oj7s5vtapaifrur2jv6zha"),
        );
        assert_eq!(
            parts.to_hashname().unwrap().as_str(),
            "nzf4f6j7ylv53z3m4egrwltv2t2yks4rtpaimeg3avwqsoshqxba"
        );
    }

    #[test]
    fn test_hashname_two_parts() {
        let mut parts = Parts::new();
        parts.insert(
            Csid(0x3a),
            part_of_encoded_key("hp6yglmmqwcbw5hno37uauh6fn6dx5oj7s5vtapaifrur2jv6zha"),
        );
        parts.insert(Csid(0x1a), part_of_encoded_key("vgjz3yjb6cevxjomdleilmzasbj6lcc7"));
        assert_eq!(
            parts.to_hashname().unwrap().as_str(),
            "jvdoio6kjvf3yqnxfvck43twaibbg4pmb7y3mqnvxafb26rqllwa"
        );
    }

    #[test]
    fn test_hashname_from_raw_part() {
        let key =
            hex::decode("3bfd832d8c85841b74ed76ff4050fe2b7c3bf5c9fcbb5981e0416348e935f64e").unwrap();
        let mut parts = Parts::new();
        parts.insert(Csid(0x3a), part_for_key(&key));
        parts.insert(Csid(0x1a), "ym7p66flpzyncnwkzxv2qk5dtosgnnstgfhw6xj2wvbvm7oz5oaq");
        assert_eq!(
            parts.to_hashname().unwrap().as_str(),
            "jvdoio6kjvf3yqnxfvck43twaibbg4pmb7y3mqnvxafb26rqllwa"
        );
    }

    #[test]
    fn test_hashname_rejects_malformed_parts() {
        assert!(Parts::new().to_hashname().is_none());

        let mut parts = Parts::new();
        parts.insert(Csid::CS1A, "tooshort");
        assert!(parts.to_hashname().is_none());

        let mut parts = Parts::new();
        parts.insert(Csid::CS1A, "1".repeat(HASHNAME_LEN));
        assert!(parts.to_hashname().is_none());
    }

    #[test]
    fn test_from_keys() {
        let key = crate::suite::OpaqueKey::new(Csid(0x3a), vec![1, 2, 3]);
        let parts = Parts::from_keys([&key as &dyn Key]);
        assert_eq!(parts.get(Csid(0x3a)), Some(part_for_key(&[1, 2, 3]).as_str()));
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut parts = Parts::new();
        parts.insert(Csid(0x3a), "a");
        parts.insert(Csid(0x1a), "b");
        parts.insert(Csid(0x3a), "c");

        let order: Vec<_> = parts.iter().collect();
        assert_eq!(order, vec![(Csid(0x3a), "c"), (Csid(0x1a), "b")]);
    }

    #[test]
    fn test_equality_ignores_order() {
        let a: Parts = [(Csid(1), "x".to_string()), (Csid(2), "y".to_string())]
            .into_iter()
            .collect();
        let b: Parts = [(Csid(2), "y".to_string()), (Csid(1), "x".to_string())]
            .into_iter()
            .collect();
        assert_eq!(a, b);

        let c: Parts = [(Csid(1), "x".to_string())].into_iter().collect();
        assert_ne!(a, c);
    }

    #[test]
    fn test_header_roundtrip() {
        let mut parts = Parts::new();
        parts.insert(Csid::CS1A, "abcdefgh");
        parts.insert(Csid(0x01), "ijklmnop");

        let mut header = Header::Empty;
        parts.apply_to_header(&mut header);
        assert_eq!(header.get_str("1a"), Some("abcdefgh"));
        assert_eq!(header.get_str("01"), Some("ijklmnop"));

        assert_eq!(Parts::from_header(&header), Some(parts));
    }

    #[test]
    fn test_from_header_rejects_foreign_fields() {
        let mut header = Header::Empty;
        header.set("zz", "value");
        assert!(Parts::from_header(&header).is_none());

        let mut header = Header::Empty;
        header.set("1a", 5);
        assert!(Parts::from_header(&header).is_none());

        let mut header = Header::Empty;
        header.set("at", "value");
        assert!(Parts::from_header(&header).is_none());

        assert_eq!(Parts::from_header(&Header::Empty), Some(Parts::new()));
    }

    #[test]
    fn test_from_header_rejects_non_canonical_csids() {
        for key in ["+1", "1A"] {
            let mut header = Header::Empty;
            header.set(key, "value");
            assert!(Parts::from_header(&header).is_none(), "accepted {:?}", key);
        }

        let mut header = Header::Empty;
        header.set("1a", "lower");
        header.set("1A", "upper");
        assert!(Parts::from_header(&header).is_none());

        let mut header = Header::Empty;
        header.set("+1", "value");
        header.set("1A", "upper");
        header.set("1a", "lower");
        assert!(Parts::from_header(&header).is_none());
    }
}
