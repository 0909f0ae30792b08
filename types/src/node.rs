//! Node records: who a peer is and where to reach it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Fingerprint, TypesError};

/// Identity of a peer as carried on the wire and held in per-node tables.
///
/// Remote records are plain value copies; connection material lives in the
/// connection registry, never here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub hostname: String,
    pub port: String,
    pub nickname: String,
    /// Home channel of the node, as last announced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl Node {
    pub fn new(
        hostname: impl Into<String>,
        port: impl Into<String>,
        nickname: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            port: port.into(),
            nickname: nickname.into(),
            channel: None,
        }
    }

    /// Builder-style home channel setter.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Parse a `host:port` string. IPv6 hosts may be bracketed (`[::1]:9000`);
    /// an unbracketed IPv6 host gets brackets added so the address stays dialable.
    pub fn from_address(address: &str, nickname: impl Into<String>) -> Result<Self, TypesError> {
        let address = address.trim();
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| TypesError::InvalidAddress(address.to_string()))?;
        if host.is_empty() || port.is_empty() || port.parse::<u16>().is_err() {
            return Err(TypesError::InvalidAddress(address.to_string()));
        }
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host.to_string()
        };
        Ok(Self::new(host, port, nickname))
    }

    /// `hostname:port` with surrounding whitespace removed from both parts.
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname.trim(), self.port.trim())
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::derive(&self.hostname, &self.port, &self.nickname)
    }

    /// Nickname without stray whitespace (line-oriented input leaves a newline).
    pub fn display_name(&self) -> &str {
        self.nickname.trim()
    }

    /// Whether two records describe the same node, ignoring channel state.
    pub fn same_identity(&self, other: &Node) -> bool {
        self.fingerprint() == other.fingerprint()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.display_name(), self.address())
    }
}
