//! Nullable peer: an in-memory connection whose far end the test reads.

use std::time::Duration;

use meshchat_messages::Envelope;
use meshchat_network::PeerStream;
use meshchat_protocol::read_envelope;
use meshchat_types::Node;
use tokio::io::DuplexStream;

const PIPE_CAPACITY: usize = 64 * 1024;

/// The remote side of a fake connection.
///
/// Hand the [`PeerStream`] from [`NullPeer::connect`] to the code under test
/// (usually by registering it) and read back the envelopes it writes.
pub struct NullPeer {
    pub node: Node,
    far: DuplexStream,
}

impl NullPeer {
    /// Create a peer for `node` and the stream the local node writes into.
    pub fn connect(node: Node) -> (PeerStream, NullPeer) {
        let (near, far) = tokio::io::duplex(PIPE_CAPACITY);
        (Box::new(near), NullPeer { node, far })
    }

    /// Next envelope written by the local node, or `None` once it hung up.
    pub async fn next_envelope(&mut self) -> Option<Envelope> {
        read_envelope(&mut self.far).await.ok().flatten()
    }

    /// Like [`next_envelope`](Self::next_envelope) but gives up after `limit`.
    pub async fn next_within(&mut self, limit: Duration) -> Option<Envelope> {
        tokio::time::timeout(limit, self.next_envelope()).await.ok().flatten()
    }

    /// Whether nothing arrives within `limit`.
    pub async fn is_quiet_for(&mut self, limit: Duration) -> bool {
        self.next_within(limit).await.is_none()
    }
}
