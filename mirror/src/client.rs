//! HTTP client used by nodes to register with a mirror.

use std::time::Duration;

use meshchat_messages::DiscoverResponse;
use meshchat_types::Node;

use crate::MirrorError;

/// Wraps `reqwest::Client` with typed mirror calls.
#[derive(Clone)]
pub struct MirrorClient {
    http: reqwest::Client,
}

impl MirrorClient {
    pub fn new(timeout: Duration) -> Result<Self, MirrorError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| MirrorError::Request(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Register `node` with `mirror` and return the roster.
    pub async fn register(&self, mirror: &Node, node: &Node) -> Result<DiscoverResponse, MirrorError> {
        let url = format!("http://{}/register", mirror.address());
        let response = self
            .http
            .post(&url)
            .json(node)
            .send()
            .await
            .map_err(|e| MirrorError::Request(e.to_string()))?;
        Self::parse(response).await
    }

    /// Current roster without registering.
    pub async fn roster(&self, mirror: &Node) -> Result<DiscoverResponse, MirrorError> {
        let url = format!("http://{}/nodes", mirror.address());
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| MirrorError::Request(e.to_string()))?;
        Self::parse(response).await
    }

    async fn parse(response: reqwest::Response) -> Result<DiscoverResponse, MirrorError> {
        if !response.status().is_success() {
            return Err(MirrorError::Status(response.status().as_u16()));
        }
        response
            .json()
            .await
            .map_err(|e| MirrorError::InvalidResponse(e.to_string()))
    }
}
