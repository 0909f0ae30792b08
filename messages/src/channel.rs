//! Channels: named groups with a membership set and a chat history.

use std::collections::BTreeMap;

use meshchat_types::{Fingerprint, Node};
use serde::{Deserialize, Serialize};

use crate::Envelope;

/// Members allowed in a channel unless configured otherwise.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

fn default_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

/// A named channel. Also the wire form of a channel snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    #[serde(default)]
    pub members: BTreeMap<Fingerprint, Node>,
    #[serde(default)]
    pub history: Vec<Envelope>,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            members: BTreeMap::new(),
            history: Vec::new(),
            capacity,
        }
    }

    /// Add or refresh a member. Returns `false` if the channel is full and
    /// `fingerprint` is not already a member.
    pub fn add_member(&mut self, fingerprint: Fingerprint, node: Node) -> bool {
        if !self.members.contains_key(&fingerprint) && self.is_full() {
            return false;
        }
        self.members.insert(fingerprint, node);
        true
    }

    pub fn remove_member(&mut self, fingerprint: &Fingerprint) -> Option<Node> {
        self.members.remove(fingerprint)
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.members.contains_key(fingerprint)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity
    }

    /// Append to the history.
    pub fn record(&mut self, envelope: Envelope) {
        self.history.push(envelope);
    }

    /// Reorder history newest first. Stable for equal timestamps.
    pub fn order_history_newest_first(&mut self) {
        self.history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }

    /// Copy suitable for sending: history ordered newest first.
    pub fn snapshot(&self) -> Channel {
        let mut snapshot = self.clone();
        snapshot.order_history_newest_first();
        snapshot
    }

    /// Copy with membership stripped, history kept.
    pub fn without_members(&self) -> Channel {
        Channel {
            name: self.name.clone(),
            members: BTreeMap::new(),
            history: self.history.clone(),
            capacity: self.capacity,
        }
    }
}
