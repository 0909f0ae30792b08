//! Liveness probing.

use std::future::Future;
use std::time::Duration;

use meshchat_types::Node;
use tokio::io::AsyncWriteExt;

use crate::{NetworkError, Transport};

/// Checks whether a peer is reachable.
///
/// A probe succeeds only if a connection (and TLS handshake, when enabled)
/// completes within `timeout`. The probe connection is closed immediately.
pub trait Probe: Send + Sync {
    fn probe(&self, node: &Node, timeout: Duration) -> impl Future<Output = Result<(), NetworkError>> + Send;
}

impl Probe for Transport {
    async fn probe(&self, node: &Node, timeout: Duration) -> Result<(), NetworkError> {
        let mut stream = self.connect_within(node, timeout).await?;
        if let Err(e) = stream.shutdown().await {
            tracing::trace!(peer = %node.address(), error = %e, "probe shutdown failed");
        }
        Ok(())
    }
}
