//! Node fingerprints: the stable correlation id of a node on the wire.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::TypesError;

/// Lowercase hex SHA-256 digest of a node's trimmed `hostname:port:nickname`.
///
/// Used as the key of every per-node table and carried in every envelope.
/// Deserialization accepts any string so that a peer announcing a bogus value
/// can still be decoded and then rejected at the semantic layer.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Length of the hex encoding of a SHA-256 digest.
    pub const HEX_LEN: usize = 64;

    /// Derive the fingerprint of the triple. Whitespace around each part is ignored.
    pub fn derive(hostname: &str, port: &str, nickname: &str) -> Self {
        let data = format!("{}:{}:{}", hostname.trim(), port.trim(), nickname.trim());
        let digest = Sha256::digest(data.as_bytes());
        Self(hex::encode(digest))
    }

    /// Parse a fingerprint received from elsewhere, checking its shape.
    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        let fp = Self(raw.trim().to_ascii_lowercase());
        if fp.is_well_formed() {
            Ok(fp)
        } else {
            Err(TypesError::InvalidFingerprint(raw.to_string()))
        }
    }

    /// Whether this is 64 lowercase hex characters.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == Self::HEX_LEN
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_hex_sha256() {
        let fp = Fingerprint::derive("127.0.0.1", "9000", "alice");
        assert!(fp.is_well_formed());
        assert_eq!(fp.as_str().len(), Fingerprint::HEX_LEN);
    }

    #[test]
    fn trailing_newline_does_not_change_fingerprint() {
        let a = Fingerprint::derive("127.0.0.1", "9000", "alice");
        let b = Fingerprint::derive(" 127.0.0.1", "9000\n", "alice\n");
        assert_eq!(a, b);
    }

    #[test]
    fn each_field_contributes() {
        let base = Fingerprint::derive("127.0.0.1", "9000", "alice");
        assert_ne!(base, Fingerprint::derive("127.0.0.2", "9000", "alice"));
        assert_ne!(base, Fingerprint::derive("127.0.0.1", "9001", "alice"));
        assert_ne!(base, Fingerprint::derive("127.0.0.1", "9000", "bob"));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Fingerprint::parse("not-a-digest").is_err());
        let fp = Fingerprint::derive("h", "1", "n");
        let upper = fp.as_str().to_ascii_uppercase();
        assert_eq!(Fingerprint::parse(&upper).unwrap(), fp);
    }

    #[test]
    fn serializes_as_plain_string() {
        let fp = Fingerprint::derive("h", "1", "n");
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, format!("\"{}\"", fp.as_str()));
    }
}
