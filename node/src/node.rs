//! The chat node: wires transport, discovery, engine and background tasks
//! together.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use meshchat_crypto::TlsMaterial;
use meshchat_mirror::MirrorClient;
use meshchat_network::{ConnectionRegistry, Transport};
use meshchat_types::Node;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::bootstrap::register_with_mirrors;
use crate::config::NodeConfig;
use crate::inbound::spawn_accept_loop;
use crate::{ChannelStore, EventBus, GossipEngine, LivenessDetector, NodeError, NodeEvent, ShutdownController};

/// Timeout for waiting on background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ChatNode {
    config: NodeConfig,
    engine: Arc<GossipEngine>,
    shutdown: ShutdownController,
    listen_addr: SocketAddr,
    mirror: Option<Node>,
    task_handles: Vec<JoinHandle<()>>,
}

impl ChatNode {
    /// Start a node with a fresh event bus.
    pub async fn start(config: NodeConfig) -> Result<Self, NodeError> {
        Self::start_with(config, EventBus::new()).await
    }

    /// Start a node publishing to `events`. Subscribe before calling this to
    /// see the events raised while joining.
    ///
    /// Order: bind the listener, register with a mirror, then start the
    /// accept loop and liveness detector and announce to the roster.
    pub async fn start_with(config: NodeConfig, events: EventBus) -> Result<Self, NodeError> {
        if config.poll_interval_secs == 0 {
            return Err(NodeError::Config("poll_interval_secs must be positive".into()));
        }
        let transport = build_transport(&config)?;

        let listener = TcpListener::bind(config.listen_address()).await?;
        let listen_addr = listener.local_addr()?;
        let mut local = config.local_node();
        if config.port == 0 {
            local.port = listen_addr.port().to_string();
        }
        if local.nickname.trim().is_empty() {
            return Err(NodeError::Config("nickname must not be empty".into()));
        }
        tracing::info!(address = %listen_addr, node = %local, tls = transport.is_tls(), "listening");

        let mirrors = config.resolve_mirrors()?;
        let (local, roster, mirror) = if mirrors.is_empty() {
            tracing::warn!("no mirrors configured, starting without a roster");
            (local, Vec::new(), None)
        } else {
            let client = MirrorClient::new(config.connect_timeout())?;
            let outcome = register_with_mirrors(
                &client,
                &mirrors,
                &local,
                config.bootstrap_attempts,
                config.bootstrap_backoff(),
            )
            .await?;
            (outcome.local, outcome.roster, Some(outcome.mirror))
        };

        let registry = Arc::new(RwLock::new(ConnectionRegistry::new()));
        let store = Arc::new(Mutex::new(ChannelStore::new(
            &config.default_channel,
            config.channel_capacity,
        )));
        let engine = Arc::new(GossipEngine::new(local, transport.clone(), registry, store, events));

        let shutdown = ShutdownController::new();
        let mut task_handles = Vec::new();
        task_handles.push(spawn_accept_loop(
            listener,
            transport.clone(),
            engine.clone(),
            shutdown.subscribe(),
        ));
        let detector = LivenessDetector::new(transport, engine.clone(), config.probe_timeout());
        task_handles.push(tokio::spawn(detector.run(config.poll_interval(), shutdown.subscribe())));

        engine.announce(&roster).await;
        tracing::info!(node = %engine.local(), "joined network");

        Ok(Self {
            config,
            engine,
            shutdown,
            listen_addr,
            mirror,
            task_handles,
        })
    }

    pub fn engine(&self) -> &Arc<GossipEngine> {
        &self.engine
    }

    /// The local node record (nickname as assigned by the mirror).
    pub fn local(&self) -> &Node {
        self.engine.local()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    /// The mirror the node registered with, if any.
    pub fn mirror(&self) -> Option<&Node> {
        self.mirror.as_ref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.engine.events().subscribe()
    }

    pub fn shutdown_controller(&self) -> ShutdownController {
        self.shutdown.clone()
    }

    /// Say goodbye to every peer, stop background tasks and drop all
    /// connections.
    pub async fn stop(&mut self) {
        tracing::info!("node stopping");

        let result = self.engine.exit().await;
        tracing::debug!(sent = result.sent, failed = result.failed.len(), "exit broadcast");

        self.shutdown.shutdown();

        // Dropping the write handles closes the outbound connections.
        *self.engine.registry().write().await = ConnectionRegistry::new();

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            tracing::warn!("shutdown timeout ({:?}), some tasks may still be running", SHUTDOWN_TIMEOUT);
        }

        tracing::info!("node stopped");
    }
}

fn build_transport(config: &NodeConfig) -> Result<Transport, NodeError> {
    if !config.enable_tls {
        return Ok(Transport::plain(config.connect_timeout()));
    }
    let material = TlsMaterial::load_or_generate(&config.tls_dir, &config.hostname)?;
    Ok(Transport::with_tls(&material, config.connect_timeout())?)
}
