//! Events emitted by the engine for whoever renders the chat.

use meshchat_messages::Envelope;
use meshchat_types::Node;
use tokio::sync::broadcast;

/// Something the user should hear about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeEvent {
    /// A peer joined the local home channel.
    Joined { channel: String, node: Node },
    /// A peer left the local home channel.
    Left { channel: String, node: Node },
    /// The local node adopted a channel snapshot.
    ChannelJoined { name: String, history: Vec<Envelope> },
    /// Chat line in the home channel (local lines included).
    Chat(Envelope),
    /// Private message addressed to the local node.
    PrivateMessage(Envelope),
    /// A peer was dialed and registered.
    PeerConnected(Node),
    /// A peer was dropped (unreachable or exited).
    PeerRemoved(Node),
}

const EVENT_CAPACITY: usize = 256;

/// Fan-out of [`NodeEvent`]s. Emitting with no subscribers is fine.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<NodeEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: NodeEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let node = Node::new("h", "1", "a");
        bus.emit(NodeEvent::PeerConnected(node.clone()));
        bus.emit(NodeEvent::PeerRemoved(node.clone()));
        assert_eq!(rx.recv().await.unwrap(), NodeEvent::PeerConnected(node.clone()));
        assert_eq!(rx.recv().await.unwrap(), NodeEvent::PeerRemoved(node));
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        EventBus::new().emit(NodeEvent::PeerRemoved(Node::new("h", "1", "a")));
    }
}
