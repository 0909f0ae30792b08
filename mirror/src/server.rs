//! Axum-based mirror server.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use meshchat_messages::DiscoverResponse;
use meshchat_types::{Node, Timestamp};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;

use crate::{MirrorConfig, MirrorError, Roster};

/// Shared state behind every handler.
#[derive(Default)]
pub struct MirrorState {
    roster: Mutex<Roster>,
}

impl MirrorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `node` and return the roster including it.
    pub async fn register(&self, node: Node) -> Result<DiscoverResponse, MirrorError> {
        validate(&node)?;
        let mut roster = self.roster.lock().await;
        let registered = roster.register(node);
        info!(
            node = %registered,
            roster_size = roster.len(),
            "node registered"
        );
        Ok(DiscoverResponse {
            node_list: roster.nodes().to_vec(),
            timestamp: Timestamp::now(),
            registered: Some(registered),
        })
    }

    pub async fn snapshot(&self) -> DiscoverResponse {
        DiscoverResponse {
            node_list: self.roster.lock().await.nodes().to_vec(),
            timestamp: Timestamp::now(),
            registered: None,
        }
    }
}

fn validate(node: &Node) -> Result<(), MirrorError> {
    if node.hostname.trim().is_empty() {
        return Err(MirrorError::InvalidNode("empty hostname".into()));
    }
    if node.port.trim().parse::<u16>().is_err() {
        return Err(MirrorError::InvalidNode(format!("bad port {:?}", node.port)));
    }
    if node.nickname.trim().is_empty() {
        return Err(MirrorError::InvalidNode("empty nickname".into()));
    }
    Ok(())
}

/// Routes served by a mirror.
pub fn router(state: Arc<MirrorState>) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/getNodes", post(register))
        .route("/nodes", get(list))
        .with_state(state)
}

async fn register(
    State(state): State<Arc<MirrorState>>,
    Json(node): Json<Node>,
) -> Result<Json<DiscoverResponse>, MirrorError> {
    state.register(node).await.map(Json)
}

async fn list(State(state): State<Arc<MirrorState>>) -> Json<DiscoverResponse> {
    Json(state.snapshot().await)
}

/// The mirror server, configured with a bind address and shared state.
pub struct MirrorServer {
    pub config: MirrorConfig,
    pub state: Arc<MirrorState>,
}

impl MirrorServer {
    pub fn new(config: MirrorConfig) -> Self {
        Self {
            config,
            state: Arc::new(MirrorState::new()),
        }
    }

    /// Bind and serve until `shutdown` resolves.
    pub async fn start(&self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<(), MirrorError> {
        let addr = self.config.listen_address();
        let listener = TcpListener::bind(&addr).await?;
        info!("mirror listening on {}", addr);
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), MirrorError> {
        axum::serve(listener, router(self.state.clone()))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| MirrorError::Server(e.to_string()))
    }
}
