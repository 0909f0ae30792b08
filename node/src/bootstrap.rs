//! Joining the mesh through a discovery mirror.
//!
//! Each mirror is tried up to `attempts` times with exponential backoff
//! before moving to the next one. Startup fails only when every mirror has
//! failed.

use std::time::Duration;

use meshchat_mirror::MirrorClient;
use meshchat_types::Node;

use crate::NodeError;

/// Result of a successful registration.
#[derive(Clone, Debug)]
pub struct BootstrapOutcome {
    /// The local node as the mirror stored it (nickname possibly suffixed).
    pub local: Node,
    /// Every node the mirror knows, the local one included.
    pub roster: Vec<Node>,
    /// The mirror that answered.
    pub mirror: Node,
}

pub async fn register_with_mirrors(
    client: &MirrorClient,
    mirrors: &[Node],
    local: &Node,
    attempts: u32,
    backoff: Duration,
) -> Result<BootstrapOutcome, NodeError> {
    if mirrors.is_empty() {
        return Err(NodeError::BootstrapFailed("no mirrors configured".into()));
    }
    let attempts = attempts.max(1);
    let mut last_error = None;

    for mirror in mirrors {
        let mut delay = backoff;
        for attempt in 1..=attempts {
            match client.register(mirror, local).await {
                Ok(response) => {
                    let registered = response.registered.unwrap_or_else(|| local.clone());
                    let local = Node {
                        nickname: registered.nickname,
                        ..local.clone()
                    };
                    tracing::info!(
                        mirror = %mirror,
                        nickname = %local.display_name(),
                        roster = response.node_list.len(),
                        "registered with mirror"
                    );
                    return Ok(BootstrapOutcome {
                        local,
                        roster: response.node_list,
                        mirror: mirror.clone(),
                    });
                }
                Err(e) => {
                    tracing::warn!(mirror = %mirror, attempt, error = %e, "mirror registration failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                        delay = delay.saturating_mul(2);
                    }
                }
            }
        }
    }

    Err(NodeError::BootstrapFailed(match last_error {
        Some(e) => format!("every mirror failed, last error: {e}"),
        None => "every mirror failed".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshchat_mirror::{MirrorConfig, MirrorServer};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn mirror() -> Node {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = Arc::new(MirrorServer::new(MirrorConfig::default()));
        tokio::spawn(async move {
            let _ = server.serve(listener, std::future::pending()).await;
        });
        Node::new("127.0.0.1", port.to_string(), "mirror")
    }

    async fn dead_mirror() -> Node {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        Node::new("127.0.0.1", port.to_string(), "dead")
    }

    fn client() -> MirrorClient {
        MirrorClient::new(Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn falls_through_to_working_mirror() {
        let mirrors = vec![dead_mirror().await, mirror().await];
        let local = Node::new("127.0.0.1", "9100", "alice");
        let outcome = register_with_mirrors(&client(), &mirrors, &local, 2, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(outcome.mirror, mirrors[1]);
        assert_eq!(outcome.roster, vec![local.clone()]);
        assert_eq!(outcome.local, local);
    }

    #[tokio::test]
    async fn adopts_disambiguated_nickname() {
        let mirrors = vec![mirror().await];
        let first = Node::new("127.0.0.1", "9101", "alice");
        let second = Node::new("127.0.0.1", "9102", "alice");
        register_with_mirrors(&client(), &mirrors, &first, 1, Duration::ZERO)
            .await
            .unwrap();
        let outcome = register_with_mirrors(&client(), &mirrors, &second, 1, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(outcome.local.nickname, "alice(1)");
        assert_eq!(outcome.local.port, "9102");
        assert_eq!(outcome.roster.len(), 2);
    }

    #[tokio::test]
    async fn all_mirrors_failing_is_fatal() {
        let mirrors = vec![dead_mirror().await, dead_mirror().await];
        let local = Node::new("127.0.0.1", "9103", "bob");
        let err = register_with_mirrors(&client(), &mirrors, &local, 2, Duration::from_millis(5))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::BootstrapFailed(_)));
    }

    #[tokio::test]
    async fn no_mirrors_is_an_error() {
        let local = Node::new("127.0.0.1", "9104", "bob");
        assert!(register_with_mirrors(&client(), &[], &local, 3, Duration::ZERO)
            .await
            .is_err());
    }
}
