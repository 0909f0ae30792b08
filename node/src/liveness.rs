//! Liveness detector: periodically probes every registered peer and prunes
//! the unreachable ones.
//!
//! Each round probes all peers concurrently and completes when every probe
//! has completed. A failed probe removes the peer from the home channel,
//! every channel and the registry. No retries.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use meshchat_network::Probe;
use meshchat_types::Node;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::GossipEngine;

pub struct LivenessDetector<P> {
    probe: P,
    engine: Arc<GossipEngine>,
    timeout: Duration,
}

impl<P: Probe> LivenessDetector<P> {
    pub fn new(probe: P, engine: Arc<GossipEngine>, timeout: Duration) -> Self {
        Self {
            probe,
            engine,
            timeout,
        }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Probe every registered peer once. Returns the nodes removed.
    pub async fn poll_round(&self) -> Vec<Node> {
        let peers = self.engine.peers().await;
        if peers.is_empty() {
            return Vec::new();
        }
        tracing::debug!(peers = peers.len(), "liveness round");

        let probes = peers.into_iter().map(|node| async move {
            let outcome = self.probe.probe(&node, self.timeout).await;
            (node, outcome)
        });

        let mut removed = Vec::new();
        for (node, outcome) in join_all(probes).await {
            if let Err(e) = outcome {
                tracing::warn!(peer = %node.fingerprint(), node = %node, error = %e, "peer unreachable");
                if let Some(node) = self.engine.remove_peer(&node.fingerprint()).await {
                    removed.push(node);
                }
            }
        }
        removed
    }

    /// Run a round every `interval` until `shutdown` fires.
    pub async fn run(self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_round().await;
                }
                _ = shutdown.recv() => {
                    tracing::debug!("liveness detector stopping");
                    break;
                }
            }
        }
    }
}
