//! The envelope: the typed unit exchanged over every node-to-node connection.
//!
//! `type` is a closed set of known values plus an escape hatch for strings
//! this build does not recognize. Unrecognized types still decode; what to do
//! with them is decided when the envelope is interpreted, not here.

use meshchat_types::{Fingerprint, Node, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// All message types in the protocol.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// A node joins the mesh; content is its channel list.
    NewNode,
    /// A node created a channel and moved into it; content is the name.
    NewChannel,
    /// A node switched channel; content is the name.
    UpdateChannel,
    /// Snapshot of a channel sent to a node that just joined it.
    ChannelInfo,
    /// Private message; content is the text.
    PrivateMessage,
    /// The sender is leaving the mesh.
    Exit,
    /// Chat line for the home channel.
    Chat,
    /// Any other `type` string seen on the wire.
    Unrecognized(String),
}

impl MessageType {
    /// Every type this build knows how to produce.
    pub const KNOWN: [MessageType; 7] = [
        MessageType::NewNode,
        MessageType::NewChannel,
        MessageType::UpdateChannel,
        MessageType::ChannelInfo,
        MessageType::PrivateMessage,
        MessageType::Exit,
        MessageType::Chat,
    ];

    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::NewNode => "NEW",
            Self::NewChannel => "NEW CHANNEL",
            Self::UpdateChannel => "UPDATE CHANNEL",
            Self::ChannelInfo => "CHANNEL INFO",
            Self::PrivateMessage => "PM",
            Self::Exit => "EXIT",
            Self::Chat => "CHAT MESSAGE",
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl From<String> for MessageType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "NEW" => Self::NewNode,
            "NEW CHANNEL" => Self::NewChannel,
            "UPDATE CHANNEL" => Self::UpdateChannel,
            "CHANNEL INFO" => Self::ChannelInfo,
            "PM" => Self::PrivateMessage,
            "EXIT" => Self::Exit,
            "CHAT MESSAGE" => Self::Chat,
            _ => Self::Unrecognized(raw),
        }
    }
}

impl From<MessageType> for String {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Unrecognized(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header fields identify the sender; `content` is interpreted per `type`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub fingerprint: Fingerprint,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Timestamp,
}

impl Envelope {
    /// Envelope from `sender`, stamped with the current time.
    pub fn new(kind: MessageType, sender: &Node, content: impl Into<String>) -> Self {
        Self::at(kind, sender, content, Timestamp::now())
    }

    pub fn at(kind: MessageType, sender: &Node, content: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            kind,
            hostname: sender.hostname.clone(),
            port: sender.port.clone(),
            nickname: sender.nickname.clone(),
            fingerprint: sender.fingerprint(),
            content: content.into(),
            timestamp,
        }
    }

    /// The sender as a node record (no channel information).
    pub fn sender(&self) -> Node {
        Node::new(self.hostname.clone(), self.port.clone(), self.nickname.clone())
    }

    /// Whether the claimed fingerprint matches the one derived from the header.
    pub fn fingerprint_matches_sender(&self) -> bool {
        Fingerprint::derive(&self.hostname, &self.port, &self.nickname) == self.fingerprint
    }

    /// `HH:MM:SS nickname: content`
    pub fn display_line(&self) -> String {
        format!(
            "{} {}: {}",
            self.timestamp.clock(),
            self.nickname.trim(),
            self.content.trim_end()
        )
    }
}
