//! Routing envelopes through the connection registry.
//!
//! Handles are cloned out of the registry before writing, so the registry
//! lock is never held across a network write.

use futures_util::future::join_all;
use meshchat_messages::Envelope;
use meshchat_types::Fingerprint;
use tokio::sync::RwLock;

use crate::{ConnectionRegistry, NetworkError, PeerHandle};

/// Outcome of a broadcast attempt.
#[derive(Clone, Debug, Default)]
pub struct BroadcastResult {
    /// Number of peers the envelope was written to.
    pub sent: usize,
    /// Peers whose write failed.
    pub failed: Vec<Fingerprint>,
}

/// Write `envelope` to one registered peer.
pub async fn dispatch(
    registry: &RwLock<ConnectionRegistry>,
    fingerprint: &Fingerprint,
    envelope: &Envelope,
) -> Result<(), NetworkError> {
    let handle = registry
        .read()
        .await
        .get(fingerprint)
        .ok_or_else(|| NetworkError::NoSuchPeer(fingerprint.clone()))?;
    handle.send(envelope).await
}

/// Write `envelope` to every registered peer.
pub async fn broadcast(registry: &RwLock<ConnectionRegistry>, envelope: &Envelope) -> BroadcastResult {
    let handles = registry.read().await.handles();
    send_to_all(handles, envelope).await
}

/// Write `envelope` to each handle concurrently.
pub async fn send_to_all(handles: Vec<(Fingerprint, PeerHandle)>, envelope: &Envelope) -> BroadcastResult {
    let writes = handles.into_iter().map(|(fingerprint, handle)| async move {
        let outcome = handle.send(envelope).await;
        (fingerprint, outcome)
    });

    let mut result = BroadcastResult::default();
    for (fingerprint, outcome) in join_all(writes).await {
        match outcome {
            Ok(()) => result.sent += 1,
            Err(e) => {
                tracing::warn!(peer = %fingerprint, error = %e, "broadcast write failed");
                result.failed.push(fingerprint);
            }
        }
    }
    result
}
