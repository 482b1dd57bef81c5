//! Length-Object-Binary (LOB) packet container.
//!
//! Every e3x payload is carried as a LOB packet:
//!
//! ```text
//! [2 bytes: header length (BE)] [header] [body]
//! ```
//!
//! - length 0: no header
//! - length 1..=6: opaque binary header (e.g. a CSID byte)
//! - length >= 7: JSON object header
//!
//! The body is raw bytes and is never interpreted here.

#![forbid(unsafe_code)]

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::{Map, Value};
use thiserror::Error;

/// Headers shorter than this are binary, longer ones are JSON.
pub const MIN_JSON_HEADER_LEN: usize = 7;

/// Size of the header length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LobError {
    #[error("packet too short: {0} bytes")]
    TooShort(usize),

    #[error("header length {header} exceeds remaining {remaining} bytes")]
    Truncated { header: usize, remaining: usize },

    #[error("header too long: {0} bytes")]
    HeaderTooLong(usize),

    #[error("json header too short: {0} bytes")]
    HeaderTooShort(usize),

    #[error("binary header too long: {0} bytes")]
    BinaryHeaderTooLong(usize),

    #[error("invalid json header: {0}")]
    InvalidJson(String),
}

/// Packet header: absent, opaque bytes, or a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Header {
    #[default]
    Empty,
    Binary(Vec<u8>),
    Json(Map<String, Value>),
}

impl Header {
    /// True when the header encodes to zero bytes.
    pub fn is_empty(&self) -> bool {
        match self {
            Header::Empty => true,
            Header::Binary(b) => b.is_empty(),
            Header::Json(m) => m.is_empty(),
        }
    }

    /// Binary header bytes, if this is a binary header.
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Header::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Header::Json(m) => m.get(key),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Integer header value that fits a `u32`.
    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    }

    /// Set a JSON header field, turning an empty or binary header into JSON.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        if !matches!(self, Header::Json(_)) {
            *self = Header::Json(Map::new());
        }
        if let Header::Json(m) = self {
            m.insert(key.into(), value.into());
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        match self {
            Header::Json(m) => m.remove(key),
            _ => None,
        }
    }

    /// JSON header fields, in encoding order.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        let map = match self {
            Header::Json(m) => Some(m),
            _ => None,
        };
        map.into_iter().flat_map(|m| m.iter())
    }

    fn encode(&self) -> Result<Vec<u8>, LobError> {
        let bytes = match self {
            Header::Empty => Vec::new(),
            Header::Binary(b) => {
                if b.len() >= MIN_JSON_HEADER_LEN {
                    return Err(LobError::BinaryHeaderTooLong(b.len()));
                }
                b.clone()
            }
            Header::Json(m) if m.is_empty() => Vec::new(),
            Header::Json(m) => {
                let raw = serde_json::to_vec(m).map_err(|e| LobError::InvalidJson(e.to_string()))?;
                if raw.len() < MIN_JSON_HEADER_LEN {
                    return Err(LobError::HeaderTooShort(raw.len()));
                }
                raw
            }
        };

        if bytes.len() > u16::MAX as usize {
            return Err(LobError::HeaderTooLong(bytes.len()));
        }
        Ok(bytes)
    }
}

/// A LOB packet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Packet {
    header: Header,
    body: Vec<u8>,
}

impl Packet {
    /// Packet with no header.
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            header: Header::Empty,
            body: body.into(),
        }
    }

    /// Packet with a short binary header.
    pub fn with_binary_header(header: impl Into<Vec<u8>>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            header: Header::Binary(header.into()),
            body: body.into(),
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> Result<Bytes, LobError> {
        let header = self.header.encode()?;

        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + header.len() + self.body.len());
        buf.put_u16(header.len() as u16);
        buf.put_slice(&header);
        buf.put_slice(&self.body);

        Ok(buf.freeze())
    }

    /// Decode from wire bytes.
    pub fn decode(data: &[u8]) -> Result<Self, LobError> {
        if data.len() < LENGTH_PREFIX_SIZE {
            return Err(LobError::TooShort(data.len()));
        }

        let header_len = u16::from_be_bytes([data[0], data[1]]) as usize;
        let rest = &data[LENGTH_PREFIX_SIZE..];
        if header_len > rest.len() {
            return Err(LobError::Truncated {
                header: header_len,
                remaining: rest.len(),
            });
        }

        let (raw_header, body) = rest.split_at(header_len);
        let header = match raw_header.len() {
            0 => Header::Empty,
            n if n < MIN_JSON_HEADER_LEN => Header::Binary(raw_header.to_vec()),
            _ => match serde_json::from_slice::<Value>(raw_header) {
                Ok(Value::Object(m)) => Header::Json(m),
                Ok(_) => return Err(LobError::InvalidJson("header is not an object".into())),
                Err(e) => return Err(LobError::InvalidJson(e.to_string())),
            },
        };

        Ok(Self {
            header,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_packet() {
        let pkt = Packet::new(Vec::new());
        let encoded = pkt.encode().unwrap();
        assert_eq!(&encoded[..], &[0, 0]);
        assert_eq!(Packet::decode(&encoded).unwrap(), pkt);
    }

    #[test]
    fn test_binary_header() {
        let pkt = Packet::with_binary_header(vec![0x1a], b"body".to_vec());
        let encoded = pkt.encode().unwrap();
        assert_eq!(&encoded[..3], &[0, 1, 0x1a]);

        let decoded = Packet::decode(&encoded).unwrap();
        assert_eq!(decoded.header().as_binary(), Some(&[0x1a][..]));
        assert_eq!(decoded.body(), b"body");
    }

    #[test]
    fn test_json_header_fields() {
        let mut pkt = Packet::new(b"hello".to_vec());
        pkt.header_mut().set("at", 42u32);
        pkt.header_mut().set("1a", "abcdef");

        let decoded = Packet::decode(&pkt.encode().unwrap()).unwrap();
        assert_eq!(decoded.header().get_u32("at"), Some(42));
        assert_eq!(decoded.header().get_str("1a"), Some("abcdef"));
        assert_eq!(decoded.body(), b"hello");
    }

    #[test]
    fn test_empty_json_header_encodes_as_none() {
        let mut pkt = Packet::new(b"x".to_vec());
        pkt.header_mut().set("k", 1);
        pkt.header_mut().remove("k");

        let encoded = pkt.encode().unwrap();
        assert_eq!(&encoded[..2], &[0, 0]);
    }

    #[test]
    fn test_binary_header_too_long() {
        let pkt = Packet::with_binary_header(vec![0u8; 7], Vec::new());
        assert_eq!(pkt.encode(), Err(LobError::BinaryHeaderTooLong(7)));
    }

    #[test]
    fn test_json_header_too_short() {
        let mut pkt = Packet::new(Vec::new());
        pkt.header_mut().set("", 1);
        assert_eq!(pkt.encode(), Err(LobError::HeaderTooShort(6)));
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            Packet::decode(&[0, 10, b'{']),
            Err(LobError::Truncated { header: 10, remaining: 1 })
        ));
        assert_eq!(Packet::decode(&[0]), Err(LobError::TooShort(1)));
    }

    #[test]
    fn test_non_object_json_rejected() {
        let mut data = vec![0, 9];
        data.extend_from_slice(b"[1,2,3,4]");
        assert!(matches!(Packet::decode(&data), Err(LobError::InvalidJson(_))));
    }

    #[test]
    fn test_u32_out_of_range() {
        let mut header = Header::default();
        header.set("at", u64::from(u32::MAX) + 1);
        assert_eq!(header.get_u32("at"), None);
        header.set("at", -1);
        assert_eq!(header.get_u32("at"), None);
    }
}
