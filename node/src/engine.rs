//! Gossip/membership engine.
//!
//! Applies every incoming envelope to the connection registry and the
//! channel store, and implements the local chat operations. Local operations
//! that change channel state build the same envelope they broadcast and feed
//! it straight to [`GossipEngine::handle`].
//!
//! Locking: the registry and the store are never locked at the same time,
//! and neither lock is held across a network write.

use std::sync::Arc;

use meshchat_messages::{Channel, Envelope, MessageType};
use meshchat_network::{
    broadcast, dispatch, send_to_all, BroadcastResult, ConnectionRegistry, NetworkError, Transport,
};
use meshchat_protocol::{interpret, Payload};
use meshchat_types::{Fingerprint, Node};
use tokio::sync::{Mutex, RwLock};

use crate::{ChannelStore, EventBus, NodeError, NodeEvent};

pub struct GossipEngine {
    local: Node,
    transport: Transport,
    registry: Arc<RwLock<ConnectionRegistry>>,
    store: Arc<Mutex<ChannelStore>>,
    events: EventBus,
}

impl GossipEngine {
    pub fn new(
        local: Node,
        transport: Transport,
        registry: Arc<RwLock<ConnectionRegistry>>,
        store: Arc<Mutex<ChannelStore>>,
        events: EventBus,
    ) -> Self {
        Self {
            local,
            transport,
            registry,
            store,
            events,
        }
    }

    pub fn local(&self) -> &Node {
        &self.local
    }

    pub fn registry(&self) -> &Arc<RwLock<ConnectionRegistry>> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<Mutex<ChannelStore>> {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn envelope(&self, kind: MessageType, content: impl Into<String>) -> Envelope {
        Envelope::new(kind, &self.local, content)
    }

    // ── Incoming envelopes ─────────────────────────────────────────────

    /// Apply one envelope. Problems with it are logged and the envelope is
    /// skipped; nothing here ends the connection it arrived on.
    pub async fn handle(&self, envelope: Envelope) {
        if !envelope.fingerprint_matches_sender() {
            tracing::warn!(
                peer = %envelope.fingerprint,
                nickname = %envelope.nickname.trim(),
                "fingerprint does not match sender, envelope dropped"
            );
            return;
        }
        let payload = match interpret(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(peer = %envelope.fingerprint, error = %e, "envelope skipped");
                return;
            }
        };
        tracing::debug!(kind = %envelope.kind, peer = %envelope.fingerprint, "handling envelope");

        match payload {
            Payload::NewNode(channels) => self.on_new_node(&envelope, channels).await,
            Payload::NewChannel(name) => self.on_new_channel(&envelope, &name).await,
            Payload::UpdateChannel(name) => self.on_update_channel(&envelope, &name).await,
            Payload::ChannelInfo(channel) => self.on_channel_info(&envelope, channel).await,
            Payload::PrivateMessage(_) => {
                self.store
                    .lock()
                    .await
                    .record_private(envelope.fingerprint.clone(), envelope.clone());
                self.events.emit(NodeEvent::PrivateMessage(envelope));
            }
            Payload::Exit => {
                if self.registry.read().await.contains(&envelope.fingerprint) {
                    self.remove_peer(&envelope.fingerprint).await;
                }
            }
            Payload::Chat(_) => {
                self.store.lock().await.record_chat(envelope.clone());
                self.events.emit(NodeEvent::Chat(envelope));
            }
        }
    }

    async fn on_new_node(&self, envelope: &Envelope, channels: Vec<Channel>) {
        let fingerprint = &envelope.fingerprint;
        if *fingerprint == self.local.fingerprint() || self.registry.read().await.contains(fingerprint) {
            tracing::debug!(peer = %fingerprint, "NEW from known node ignored");
            return;
        }

        let added = self.store.lock().await.merge_channels(channels);
        if !added.is_empty() {
            tracing::debug!(peer = %fingerprint, channels = ?added, "merged channel list");
        }

        let sender = envelope.sender();
        let stream = match self.transport.connect(&sender).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(peer = %fingerprint, error = %e, "could not dial back new node");
                return;
            }
        };
        self.registry.write().await.insert(sender.clone(), stream);
        tracing::info!(peer = %fingerprint, node = %sender, "node joined the mesh");
        self.events.emit(NodeEvent::PeerConnected(sender));

        let home = self.store.lock().await.home_name().to_string();
        let welcome = self.envelope(MessageType::UpdateChannel, home);
        if let Err(e) = dispatch(&self.registry, fingerprint, &welcome).await {
            tracing::warn!(peer = %fingerprint, error = %e, "welcome failed");
        }
    }

    async fn on_new_channel(&self, envelope: &Envelope, name: &str) {
        let fingerprint = &envelope.fingerprint;
        let known = {
            let mut registry = self.registry.write().await;
            let previous = registry.node(fingerprint).and_then(|n| n.channel.clone());
            registry
                .set_channel(fingerprint, name)
                .then(|| (previous, envelope.sender().with_channel(name)))
        };

        let mut store = self.store.lock().await;
        if store.ensure_channel(name) {
            tracing::info!(channel = %name, creator = %envelope.nickname.trim(), "channel created");
        }
        let Some((previous, node)) = known else {
            return;
        };
        if let Some(previous) = previous {
            store.remove_from_channel(&previous, fingerprint);
        }
        if let Err(e) = store.add_to_channel(name, fingerprint.clone(), node.clone()) {
            tracing::warn!(peer = %fingerprint, channel = %name, error = %e, "membership not recorded");
        }
        // A channel named like our home is our home: keep both views in step.
        if name == store.home_name() {
            if store.home().contains(fingerprint) {
                return;
            }
            match store.add_to_home(fingerprint.clone(), node.clone()) {
                Ok(()) => {
                    drop(store);
                    self.events.emit(NodeEvent::Joined {
                        channel: name.to_string(),
                        node,
                    });
                }
                Err(e) => tracing::warn!(peer = %fingerprint, error = %e, "join refused"),
            }
            return;
        }
        if store.remove_from_home(fingerprint).is_some() {
            let channel = store.home_name().to_string();
            drop(store);
            self.events.emit(NodeEvent::Left { channel, node });
        }
    }

    async fn on_update_channel(&self, envelope: &Envelope, name: &str) {
        let fingerprint = &envelope.fingerprint;
        let (previous, node) = {
            let mut registry = self.registry.write().await;
            let Some(current) = registry.node(fingerprint).cloned() else {
                tracing::debug!(peer = %fingerprint, "UPDATE CHANNEL from unknown node ignored");
                return;
            };
            registry.set_channel(fingerprint, name);
            (current.channel.clone(), current.with_channel(name))
        };

        let reply = {
            let mut store = self.store.lock().await;
            if let Some(previous) = &previous {
                store.remove_from_channel(previous, fingerprint);
            }
            if store.ensure_channel(name) {
                tracing::info!(channel = %name, peer = %fingerprint, "channel learned from update");
            }
            if let Err(e) = store.add_to_channel(name, fingerprint.clone(), node.clone()) {
                tracing::warn!(peer = %fingerprint, channel = %name, error = %e, "membership not recorded");
            }

            if name == store.home_name() {
                match store.add_to_home(fingerprint.clone(), node.clone()) {
                    Ok(()) => {
                        self.events.emit(NodeEvent::Joined {
                            channel: name.to_string(),
                            node: node.clone(),
                        });
                        Some(store.home().snapshot())
                    }
                    Err(e) => {
                        tracing::warn!(peer = %fingerprint, error = %e, "join refused");
                        None
                    }
                }
            } else {
                if store.remove_from_home(fingerprint).is_some() {
                    self.events.emit(NodeEvent::Left {
                        channel: store.home_name().to_string(),
                        node: node.clone(),
                    });
                }
                None
            }
        };

        if let Some(snapshot) = reply {
            let info = match Payload::ChannelInfo(snapshot).into_envelope(&self.local) {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!(error = %e, "could not encode channel snapshot");
                    return;
                }
            };
            if let Err(e) = dispatch(&self.registry, fingerprint, &info).await {
                tracing::warn!(peer = %fingerprint, error = %e, "channel info not delivered");
            }
        }
    }

    async fn on_channel_info(&self, envelope: &Envelope, mut snapshot: Channel) {
        let local_fp = self.local.fingerprint();
        let responder = {
            let registry = self.registry.read().await;
            snapshot
                .members
                .retain(|fp, _| *fp != local_fp && registry.contains(fp));
            registry
                .node(&envelope.fingerprint)
                .cloned()
                .unwrap_or_else(|| envelope.sender())
                .with_channel(snapshot.name.clone())
        };

        let mut store = self.store.lock().await;
        if store.adopt_home(snapshot, responder) {
            let home = store.home();
            let event = NodeEvent::ChannelJoined {
                name: home.name.clone(),
                history: home.history.clone(),
            };
            tracing::info!(channel = %home.name, members = home.member_count(), "joined channel");
            drop(store);
            self.events.emit(event);
        }
    }

    /// Forget `fingerprint`: drop it from the home channel, every channel
    /// and the registry. Returns the removed node record.
    pub async fn remove_peer(&self, fingerprint: &Fingerprint) -> Option<Node> {
        let removed = self.registry.write().await.remove(fingerprint);
        self.store.lock().await.remove_everywhere(fingerprint);
        let node = removed?.node;
        tracing::info!(peer = %fingerprint, node = %node, "peer removed");
        self.events.emit(NodeEvent::PeerRemoved(node.clone()));
        Some(node)
    }

    // ── Local operations ───────────────────────────────────────────────

    /// Create channel `name` and move into it.
    pub async fn create_channel(&self, name: &str) -> Result<BroadcastResult, NodeError> {
        let name = valid_channel_name(name)?;
        self.store.lock().await.enter_home(name, true);
        let envelope = self.envelope(MessageType::NewChannel, name);
        let result = broadcast(&self.registry, &envelope).await;
        self.prune_failed(&result).await;
        self.handle(envelope).await;
        Ok(result)
    }

    /// Move into channel `name`; its state arrives as `CHANNEL INFO` from
    /// the peers already in it.
    pub async fn change_channel(&self, name: &str) -> Result<BroadcastResult, NodeError> {
        let name = valid_channel_name(name)?;
        self.store.lock().await.enter_home(name, false);
        let envelope = self.envelope(MessageType::UpdateChannel, name);
        let result = broadcast(&self.registry, &envelope).await;
        self.prune_failed(&result).await;
        self.handle(envelope).await;
        Ok(result)
    }

    /// Send a chat line to every member of the home channel.
    pub async fn send_chat(&self, text: &str) -> BroadcastResult {
        let envelope = self.envelope(MessageType::Chat, text);
        let members: Vec<Fingerprint> = self.store.lock().await.home().members.keys().cloned().collect();
        let handles = {
            let registry = self.registry.read().await;
            members
                .iter()
                .filter_map(|fp| registry.get(fp).map(|h| (fp.clone(), h)))
                .collect()
        };
        let result = send_to_all(handles, &envelope).await;
        self.prune_failed(&result).await;
        self.handle(envelope).await;
        result
    }

    /// Send a private message to one registered peer.
    pub async fn send_private(&self, target: &Fingerprint, text: &str) -> Result<(), NodeError> {
        let envelope = self.envelope(MessageType::PrivateMessage, text);
        if let Err(e) = dispatch(&self.registry, target, &envelope).await {
            if matches!(e, NetworkError::WriteFailed { .. }) {
                self.remove_peer(target).await;
            }
            return Err(e.into());
        }
        self.store.lock().await.record_private(target.clone(), envelope);
        Ok(())
    }

    /// A failed write means the peer is gone: drop it as a failed probe would.
    async fn prune_failed(&self, result: &BroadcastResult) {
        for fingerprint in &result.failed {
            self.remove_peer(fingerprint).await;
        }
    }

    /// Send a private message to the registered peer called `nickname`.
    pub async fn send_private_to(&self, nickname: &str, text: &str) -> Result<Node, NodeError> {
        let found = self.registry.read().await.find_by_nickname(nickname);
        let (fingerprint, node) = found.ok_or_else(|| NodeError::UnknownPeer(nickname.trim().to_string()))?;
        self.send_private(&fingerprint, text).await?;
        Ok(node)
    }

    /// Dial every roster entry not at our own address, register it and announce:
    /// `NEW` with our channel list, then `UPDATE CHANNEL` with our home.
    /// Peers that cannot be reached are logged and skipped. Returns how
    /// many were announced to.
    pub async fn announce(&self, roster: &[Node]) -> usize {
        let local_fp = self.local.fingerprint();
        let local_address = self.local.address();
        let (channel_list, home) = {
            let store = self.store.lock().await;
            (store.channel_list(), store.home_name().to_string())
        };
        let hello = match Payload::NewNode(channel_list).into_envelope(&self.local) {
            Ok(hello) => hello,
            Err(e) => {
                tracing::warn!(error = %e, "could not encode channel list");
                return 0;
            }
        };
        let update = self.envelope(MessageType::UpdateChannel, home);

        let mut announced = 0;
        for node in roster {
            let fingerprint = node.fingerprint();
            // The roster keeps stale records, possibly one at our own address
            // under an older nickname.
            if fingerprint == local_fp || node.address() == local_address {
                continue;
            }
            let stream = match self.transport.connect(node).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!(peer = %fingerprint, node = %node, error = %e, "roster peer unreachable, skipped");
                    continue;
                }
            };
            let peer = Node {
                channel: None,
                ..node.clone()
            };
            self.registry.write().await.insert(peer.clone(), stream);
            self.events.emit(NodeEvent::PeerConnected(peer));

            let sent = async {
                dispatch(&self.registry, &fingerprint, &hello).await?;
                dispatch(&self.registry, &fingerprint, &update).await
            };
            match sent.await {
                Ok(()) => announced += 1,
                Err(e) => tracing::warn!(peer = %fingerprint, error = %e, "announce failed"),
            }
        }
        tracing::info!(announced, roster = roster.len(), "announced to mesh");
        announced
    }

    /// Tell every registered peer we are leaving.
    pub async fn exit(&self) -> BroadcastResult {
        let envelope = self.envelope(MessageType::Exit, "");
        broadcast(&self.registry, &envelope).await
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub async fn home_name(&self) -> String {
        self.store.lock().await.home_name().to_string()
    }

    /// Members of the home channel.
    pub async fn members(&self) -> Vec<Node> {
        self.store.lock().await.home().members.values().cloned().collect()
    }

    /// Home channel history, newest first.
    pub async fn history(&self) -> Vec<Envelope> {
        self.store.lock().await.home().snapshot().history
    }

    /// Known channels with member counts.
    pub async fn channels(&self) -> Vec<(String, usize)> {
        self.store
            .lock()
            .await
            .channels()
            .map(|c| (c.name.clone(), c.member_count()))
            .collect()
    }

    pub async fn peers(&self) -> Vec<Node> {
        self.registry.read().await.nodes()
    }
}

fn valid_channel_name(name: &str) -> Result<&str, NodeError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(NodeError::InvalidChannelName(name.to_string()));
    }
    Ok(name)
}
