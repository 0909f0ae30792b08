//! Per-node channel state: known channels, the home channel and private
//! message history.
//!
//! Built at node start and shared behind one `tokio::sync::Mutex`. Every
//! member recorded here must also be in the connection registry; callers
//! enforce that before adding.

use std::collections::{BTreeMap, HashMap};

use meshchat_messages::{Channel, Envelope};
use meshchat_types::{Fingerprint, Node};

use crate::NodeError;

pub struct ChannelStore {
    channels: BTreeMap<String, Channel>,
    home: Channel,
    home_synced: bool,
    private_messages: HashMap<Fingerprint, Vec<Envelope>>,
    capacity: usize,
}

impl ChannelStore {
    /// Store whose home (and only known channel) is `default_channel`.
    pub fn new(default_channel: &str, capacity: usize) -> Self {
        let home = Channel::with_capacity(default_channel, capacity);
        let mut channels = BTreeMap::new();
        channels.insert(default_channel.to_string(), home.without_members());
        Self {
            channels,
            home,
            home_synced: false,
            private_messages: HashMap::new(),
            capacity,
        }
    }

    pub fn home(&self) -> &Channel {
        &self.home
    }

    pub fn home_name(&self) -> &str {
        &self.home.name
    }

    /// Whether a snapshot of the home channel has been adopted since the
    /// last channel switch.
    pub fn is_home_synced(&self) -> bool {
        self.home_synced
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    pub fn contains_channel(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    /// Known channels, sorted by name.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Channel list as announced in `NEW`: membership stripped.
    pub fn channel_list(&self) -> Vec<Channel> {
        self.channels.values().map(Channel::without_members).collect()
    }

    /// Create `name` if unknown. Returns whether it was created.
    pub fn ensure_channel(&mut self, name: &str) -> bool {
        if self.channels.contains_key(name) {
            return false;
        }
        self.channels
            .insert(name.to_string(), Channel::with_capacity(name, self.capacity));
        tracing::debug!(channel = %name, "channel created");
        true
    }

    /// Merge a peer's channel list. Unknown channels are added with empty
    /// membership and their history kept; known ones are left alone.
    /// Returns the names that were added.
    pub fn merge_channels(&mut self, incoming: Vec<Channel>) -> Vec<String> {
        let mut added = Vec::new();
        for channel in incoming {
            if channel.name.trim().is_empty() || self.channels.contains_key(&channel.name) {
                continue;
            }
            let mut channel = channel.without_members();
            channel.capacity = self.capacity;
            added.push(channel.name.clone());
            self.channels.insert(channel.name.clone(), channel);
        }
        added
    }

    /// Record `node` as a member of the known channel `name`.
    pub fn add_to_channel(&mut self, name: &str, fingerprint: Fingerprint, node: Node) -> Result<(), NodeError> {
        let channel = self
            .channels
            .get_mut(name)
            .ok_or_else(|| NodeError::UnknownChannel(name.to_string()))?;
        if channel.add_member(fingerprint, node) {
            Ok(())
        } else {
            Err(NodeError::ChannelFull(name.to_string()))
        }
    }

    pub fn remove_from_channel(&mut self, name: &str, fingerprint: &Fingerprint) -> Option<Node> {
        self.channels.get_mut(name)?.remove_member(fingerprint)
    }

    /// Add `node` to the home channel. Fails if the channel is full.
    pub fn add_to_home(&mut self, fingerprint: Fingerprint, node: Node) -> Result<(), NodeError> {
        if self.home.add_member(fingerprint, node) {
            Ok(())
        } else {
            Err(NodeError::ChannelFull(self.home.name.clone()))
        }
    }

    pub fn remove_from_home(&mut self, fingerprint: &Fingerprint) -> Option<Node> {
        self.home.remove_member(fingerprint)
    }

    /// Drop `fingerprint` from the home channel and every known channel.
    /// Returns whether it was a member anywhere.
    pub fn remove_everywhere(&mut self, fingerprint: &Fingerprint) -> bool {
        let mut found = self.home.remove_member(fingerprint).is_some();
        for channel in self.channels.values_mut() {
            found |= channel.remove_member(fingerprint).is_some();
        }
        found
    }

    /// Switch the home channel to a fresh, empty `name`.
    ///
    /// The old home's history is kept under its name in the channel map.
    pub fn enter_home(&mut self, name: &str, synced: bool) {
        let fresh = Channel::with_capacity(name, self.capacity);
        let previous = std::mem::replace(&mut self.home, fresh);
        self.archive(previous);
        self.ensure_channel(name);
        self.home_synced = synced;
    }

    fn archive(&mut self, previous: Channel) {
        let entry = self
            .channels
            .entry(previous.name.clone())
            .or_insert_with(|| Channel::with_capacity(&previous.name, self.capacity));
        if previous.history.len() >= entry.history.len() {
            entry.history = previous.history;
        }
    }

    /// Apply a `CHANNEL_INFO` snapshot from `responder`.
    ///
    /// The snapshot replaces the home channel if its name differs from the
    /// home or the home has not been synchronized since the last switch; any
    /// local history the snapshot lacks is kept. Otherwise only the responder
    /// is added as a member. Returns whether the snapshot was adopted.
    ///
    /// `snapshot.members` must already be filtered to registered peers.
    pub fn adopt_home(&mut self, mut snapshot: Channel, responder: Node) -> bool {
        let responder_fp = responder.fingerprint();
        if snapshot.name == self.home.name && self.home_synced {
            if !self.home.add_member(responder_fp, responder) {
                tracing::warn!(channel = %self.home.name, "home channel full, responder not added");
            }
            return false;
        }

        snapshot.capacity = self.capacity;
        if snapshot.name == self.home.name {
            for envelope in &self.home.history {
                if !snapshot.history.contains(envelope) {
                    snapshot.history.push(envelope.clone());
                }
            }
            for (fingerprint, node) in &self.home.members {
                snapshot.members.entry(fingerprint.clone()).or_insert_with(|| node.clone());
            }
        }
        if !snapshot.add_member(responder_fp, responder) {
            tracing::warn!(channel = %snapshot.name, "adopted channel full, responder not added");
        }
        snapshot.order_history_newest_first();

        self.ensure_channel(&snapshot.name);
        let previous = std::mem::replace(&mut self.home, snapshot);
        if previous.name != self.home.name {
            self.archive(previous);
        }
        self.home_synced = true;
        true
    }

    /// Append a chat line to the home history.
    pub fn record_chat(&mut self, envelope: Envelope) {
        self.home.record(envelope);
    }

    /// Append to the private history with `peer`.
    pub fn record_private(&mut self, peer: Fingerprint, envelope: Envelope) {
        self.private_messages.entry(peer).or_default().push(envelope);
    }

    pub fn private_history(&self, peer: &Fingerprint) -> &[Envelope] {
        self.private_messages.get(peer).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshchat_messages::MessageType;
    use meshchat_types::Timestamp;

    fn node(nick: &str) -> Node {
        Node::new("10.0.0.1", "9000", nick)
    }

    fn chat(from: &Node, text: &str, millis: i64) -> Envelope {
        Envelope::at(MessageType::Chat, from, text, Timestamp::from_unix_millis(millis))
    }

    #[test]
    fn starts_in_default_channel() {
        let store = ChannelStore::new("lobby", 100);
        assert_eq!(store.home_name(), "lobby");
        assert!(store.contains_channel("lobby"));
        assert!(!store.is_home_synced());
    }

    #[test]
    fn merge_strips_members_and_keeps_history() {
        let mut store = ChannelStore::new("lobby", 100);
        let mut general = Channel::new("general");
        general.add_member(node("x").fingerprint(), node("x"));
        general.record(chat(&node("x"), "hi", 1));
        let mut lobby = Channel::new("lobby");
        lobby.record(chat(&node("x"), "ignored", 1));

        let added = store.merge_channels(vec![general, lobby]);
        assert_eq!(added, ["general"]);
        let merged = store.channel("general").unwrap();
        assert!(merged.members.is_empty());
        assert_eq!(merged.history.len(), 1);
        assert!(store.channel("lobby").unwrap().history.is_empty());
    }

    #[test]
    fn merge_of_empty_list_adds_nothing() {
        let mut store = ChannelStore::new("lobby", 100);
        assert!(store.merge_channels(Vec::new()).is_empty());
        assert_eq!(store.channels().count(), 1);
    }

    #[test]
    fn add_to_unknown_channel_fails() {
        let mut store = ChannelStore::new("lobby", 100);
        let err = store
            .add_to_channel("nowhere", node("a").fingerprint(), node("a"))
            .unwrap_err();
        assert!(matches!(err, NodeError::UnknownChannel(_)));
    }

    #[test]
    fn full_home_refuses() {
        let mut store = ChannelStore::new("lobby", 1);
        store.add_to_home(node("a").fingerprint(), node("a")).unwrap();
        let err = store.add_to_home(node("b").fingerprint(), node("b")).unwrap_err();
        assert!(matches!(err, NodeError::ChannelFull(_)));
    }

    #[test]
    fn remove_everywhere_clears_all_tables() {
        let mut store = ChannelStore::new("lobby", 100);
        store.ensure_channel("general");
        let a = node("a");
        store.add_to_home(a.fingerprint(), a.clone()).unwrap();
        store.add_to_channel("general", a.fingerprint(), a.clone()).unwrap();
        assert!(store.remove_everywhere(&a.fingerprint()));
        assert!(!store.home().contains(&a.fingerprint()));
        assert!(!store.channel("general").unwrap().contains(&a.fingerprint()));
        assert!(!store.remove_everywhere(&a.fingerprint()));
    }

    #[test]
    fn enter_home_archives_history() {
        let mut store = ChannelStore::new("lobby", 100);
        store.record_chat(chat(&node("a"), "old", 1));
        store.enter_home("general", false);
        assert_eq!(store.home_name(), "general");
        assert!(store.home().history.is_empty());
        assert_eq!(store.channel("lobby").unwrap().history.len(), 1);
        assert!(store.contains_channel("general"));
    }

    #[test]
    fn adopt_orders_newest_first_and_adds_responder() {
        let mut store = ChannelStore::new("lobby", 100);
        store.enter_home("general", false);
        let responder = node("b");
        let mut snapshot = Channel::new("general");
        snapshot.record(chat(&responder, "first", 10));
        snapshot.record(chat(&responder, "second", 20));

        assert!(store.adopt_home(snapshot, responder.clone()));
        assert!(store.is_home_synced());
        let texts: Vec<_> = store.home().history.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(texts, ["second", "first"]);
        assert!(store.home().contains(&responder.fingerprint()));
    }

    #[test]
    fn synced_home_only_gains_responder() {
        let mut store = ChannelStore::new("lobby", 100);
        let b = node("b");
        let c = node("c");
        assert!(store.adopt_home(Channel::new("lobby"), b.clone()));

        let mut late = Channel::new("lobby");
        late.record(chat(&c, "should not replace", 5));
        assert!(!store.adopt_home(late, c.clone()));
        assert!(store.home().history.is_empty());
        assert!(store.home().contains(&b.fingerprint()));
        assert!(store.home().contains(&c.fingerprint()));
    }

    #[test]
    fn adopt_keeps_local_history() {
        let mut store = ChannelStore::new("lobby", 100);
        let a = node("a");
        store.record_chat(chat(&a, "mine", 30));
        let mut snapshot = Channel::new("lobby");
        snapshot.record(chat(&a, "theirs", 10));
        store.adopt_home(snapshot, node("b"));
        let texts: Vec<_> = store.home().history.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(texts, ["mine", "theirs"]);
    }

    #[test]
    fn private_history_per_peer() {
        let mut store = ChannelStore::new("lobby", 100);
        let a = node("a");
        store.record_private(a.fingerprint(), chat(&a, "psst", 1));
        assert_eq!(store.private_history(&a.fingerprint()).len(), 1);
        assert!(store.private_history(&node("z").fingerprint()).is_empty());
    }
}
