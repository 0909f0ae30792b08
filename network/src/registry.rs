//! Connection registry: fingerprint to (node record, live write handle).
//!
//! Shared between the engine (which registers peers as they announce
//! themselves), local operations and the liveness detector. Exactly one
//! handle per fingerprint; re-registering replaces the old one.

use std::collections::HashMap;
use std::sync::Arc;

use meshchat_messages::Envelope;
use meshchat_protocol::write_envelope;
use meshchat_types::{Fingerprint, Node};
use tokio::sync::Mutex;

use crate::{NetworkError, PeerStream};

/// A registered peer. Cloning shares the underlying connection.
#[derive(Clone)]
pub struct PeerHandle {
    pub node: Node,
    writer: Arc<Mutex<PeerStream>>,
}

impl PeerHandle {
    pub fn new(node: Node, stream: PeerStream) -> Self {
        Self {
            node,
            writer: Arc::new(Mutex::new(stream)),
        }
    }

    /// Write one framed envelope. Concurrent sends on the same handle are
    /// serialized by the writer mutex.
    pub async fn send(&self, envelope: &Envelope) -> Result<(), NetworkError> {
        let mut writer = self.writer.lock().await;
        write_envelope(&mut *writer, envelope)
            .await
            .map_err(|e| NetworkError::WriteFailed {
                peer: self.node.fingerprint(),
                reason: e.to_string(),
            })
    }
}

impl std::fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerHandle").field("node", &self.node).finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<Fingerprint, PeerHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `node` with a fresh stream, replacing any previous handle.
    /// Returns the replaced handle.
    pub fn insert(&mut self, node: Node, stream: PeerStream) -> Option<PeerHandle> {
        let fingerprint = node.fingerprint();
        self.connections.insert(fingerprint, PeerHandle::new(node, stream))
    }

    pub fn remove(&mut self, fingerprint: &Fingerprint) -> Option<PeerHandle> {
        self.connections.remove(fingerprint)
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<PeerHandle> {
        self.connections.get(fingerprint).cloned()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.connections.contains_key(fingerprint)
    }

    pub fn node(&self, fingerprint: &Fingerprint) -> Option<&Node> {
        self.connections.get(fingerprint).map(|h| &h.node)
    }

    /// Record `channel` as the peer's home channel. Returns `false` if the
    /// peer is not registered.
    pub fn set_channel(&mut self, fingerprint: &Fingerprint, channel: &str) -> bool {
        match self.connections.get_mut(fingerprint) {
            Some(handle) => {
                handle.node.channel = Some(channel.to_string());
                true
            }
            None => false,
        }
    }

    /// First registered peer whose trimmed nickname equals `nickname`.
    pub fn find_by_nickname(&self, nickname: &str) -> Option<(Fingerprint, Node)> {
        let wanted = nickname.trim();
        self.connections
            .iter()
            .find(|(_, h)| h.node.nickname.trim() == wanted)
            .map(|(fp, h)| (fp.clone(), h.node.clone()))
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.connections.values().map(|h| h.node.clone()).collect()
    }

    /// Snapshot of every handle, for writing outside the registry lock.
    pub fn handles(&self) -> Vec<(Fingerprint, PeerHandle)> {
        self.connections
            .iter()
            .map(|(fp, h)| (fp.clone(), h.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
