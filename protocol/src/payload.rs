//! Typed interpretation of an envelope's `content`.
//!
//! Decoding only checks the envelope structure. Interpretation is the second
//! step and is permissive about `type`: anything unrecognized is chat.

use meshchat_messages::{Channel, Envelope, MessageType};
use meshchat_types::Node;

use crate::ProtocolError;

/// What an envelope means once its content has been parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// Sender joined; carries its channel list.
    NewNode(Vec<Channel>),
    NewChannel(String),
    UpdateChannel(String),
    ChannelInfo(Channel),
    PrivateMessage(String),
    Exit,
    Chat(String),
}

impl Payload {
    pub fn kind(&self) -> MessageType {
        match self {
            Payload::NewNode(_) => MessageType::NewNode,
            Payload::NewChannel(_) => MessageType::NewChannel,
            Payload::UpdateChannel(_) => MessageType::UpdateChannel,
            Payload::ChannelInfo(_) => MessageType::ChannelInfo,
            Payload::PrivateMessage(_) => MessageType::PrivateMessage,
            Payload::Exit => MessageType::Exit,
            Payload::Chat(_) => MessageType::Chat,
        }
    }

    /// Build the envelope carrying this payload from `sender`.
    pub fn into_envelope(self, sender: &Node) -> Result<Envelope, ProtocolError> {
        let kind = self.kind();
        let content = match self {
            Payload::NewNode(channels) => to_content(&kind, &channels)?,
            Payload::ChannelInfo(channel) => to_content(&kind, &channel)?,
            Payload::NewChannel(text)
            | Payload::UpdateChannel(text)
            | Payload::PrivateMessage(text)
            | Payload::Chat(text) => text,
            Payload::Exit => String::new(),
        };
        Ok(Envelope::new(kind, sender, content))
    }
}

fn to_content(kind: &MessageType, value: &impl serde::Serialize) -> Result<String, ProtocolError> {
    serde_json::to_string(value).map_err(|e| ProtocolError::MalformedContent {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

fn from_content<T: serde::de::DeserializeOwned>(envelope: &Envelope) -> Result<T, ProtocolError> {
    serde_json::from_str(&envelope.content).map_err(|e| ProtocolError::MalformedContent {
        kind: envelope.kind.to_string(),
        reason: e.to_string(),
    })
}

/// Parse `envelope.content` according to its type.
pub fn interpret(envelope: &Envelope) -> Result<Payload, ProtocolError> {
    let payload = match &envelope.kind {
        MessageType::NewNode => {
            // An empty body means no channels.
            if envelope.content.trim().is_empty() {
                Payload::NewNode(Vec::new())
            } else {
                Payload::NewNode(from_content(envelope)?)
            }
        }
        MessageType::NewChannel => Payload::NewChannel(channel_name(envelope)?),
        MessageType::UpdateChannel => Payload::UpdateChannel(channel_name(envelope)?),
        MessageType::ChannelInfo => Payload::ChannelInfo(from_content(envelope)?),
        MessageType::PrivateMessage => Payload::PrivateMessage(envelope.content.clone()),
        MessageType::Exit => Payload::Exit,
        MessageType::Chat | MessageType::Unrecognized(_) => Payload::Chat(envelope.content.clone()),
    };
    Ok(payload)
}

fn channel_name(envelope: &Envelope) -> Result<String, ProtocolError> {
    let name = envelope.content.trim();
    if name.is_empty() {
        return Err(ProtocolError::MalformedContent {
            kind: envelope.kind.to_string(),
            reason: "empty channel name".into(),
        });
    }
    Ok(name.to_string())
}
