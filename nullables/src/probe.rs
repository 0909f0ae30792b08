//! Nullable probe: reachability decided by the test, not the network.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use meshchat_network::{NetworkError, Probe};
use meshchat_types::{Fingerprint, Node};

/// A liveness probe that never dials.
///
/// Every node is reachable unless marked down. Each probe is recorded.
#[derive(Default)]
pub struct NullProbe {
    down: Mutex<HashSet<Fingerprint>>,
    probed: Mutex<Vec<Fingerprint>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl NullProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make probes of `node` fail.
    pub fn mark_down(&self, node: &Node) {
        lock(&self.down).insert(node.fingerprint());
    }

    /// Make probes of `node` succeed again.
    pub fn mark_up(&self, node: &Node) {
        lock(&self.down).remove(&node.fingerprint());
    }

    /// Fingerprints probed so far, in call order.
    pub fn probed(&self) -> Vec<Fingerprint> {
        lock(&self.probed).clone()
    }

    pub fn reset(&self) {
        lock(&self.down).clear();
        lock(&self.probed).clear();
    }
}

impl Probe for NullProbe {
    async fn probe(&self, node: &Node, _timeout: Duration) -> Result<(), NetworkError> {
        let fingerprint = node.fingerprint();
        lock(&self.probed).push(fingerprint.clone());
        if lock(&self.down).contains(&fingerprint) {
            return Err(NetworkError::ConnectionFailed {
                address: node.address(),
                reason: "marked down".into(),
            });
        }
        Ok(())
    }
}
