//! Node configuration with TOML file support, plus the mirror list format.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use meshchat_messages::DEFAULT_CHANNEL_CAPACITY;
use meshchat_types::Node;

use crate::NodeError;

/// Configuration for a meshchat node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Hostname advertised to peers and the mirror.
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Port to listen on for peer connections. `0` picks a free port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Interface to bind; defaults to `hostname`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_host: Option<String>,

    /// Display name. Empty means "ask".
    #[serde(default)]
    pub nickname: String,

    /// Channel joined at startup.
    #[serde(default = "default_channel")]
    pub default_channel: String,

    /// Maximum members per channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// File with one `host:port++nickname` mirror per line.
    #[serde(default = "default_mirror_list")]
    pub mirror_list: PathBuf,

    /// Additional mirrors in the same format, checked before the file.
    #[serde(default)]
    pub mirrors: Vec<String>,

    /// Seconds between liveness poll rounds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Bound on one liveness probe, TLS handshake included.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Bound on dialing a peer.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Registration attempts per mirror.
    #[serde(default = "default_bootstrap_attempts")]
    pub bootstrap_attempts: u32,

    /// Backoff before the second attempt; doubles after each failure.
    #[serde(default = "default_bootstrap_backoff_ms")]
    pub bootstrap_backoff_ms: u64,

    /// Wrap peer connections in TLS.
    #[serde(default)]
    pub enable_tls: bool,

    /// Where `cert.pem` and `key.pem` live (generated when absent).
    #[serde(default = "default_tls_dir")]
    pub tls_dir: PathBuf,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_hostname() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7000
}

fn default_channel() -> String {
    "lobby".to_string()
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_mirror_list() -> PathBuf {
    PathBuf::from("mirrorlist.txt")
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_probe_timeout_secs() -> u64 {
    7
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_bootstrap_attempts() -> u32 {
    3
}

fn default_bootstrap_backoff_ms() -> u64 {
    500
}

fn default_tls_dir() -> PathBuf {
    PathBuf::from("certs")
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// The local node record as configured.
    pub fn local_node(&self) -> Node {
        Node::new(self.hostname.clone(), self.port.to_string(), self.nickname.trim())
    }

    /// `host:port` to bind the peer listener on.
    pub fn listen_address(&self) -> String {
        let host = self.listen_host.as_deref().unwrap_or(&self.hostname).trim();
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.contains(':') {
            format!("[{host}]:{}", self.port)
        } else {
            format!("{host}:{}", self.port)
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn bootstrap_backoff(&self) -> Duration {
        Duration::from_millis(self.bootstrap_backoff_ms)
    }

    /// Inline mirrors followed by those in `mirror_list`. A missing list
    /// file is not an error.
    pub fn resolve_mirrors(&self) -> Result<Vec<Node>, NodeError> {
        let mut mirrors = parse_mirror_list(&self.mirrors.join("\n"))?;
        if self.mirror_list.exists() {
            mirrors.extend(load_mirror_list(&self.mirror_list)?);
        } else {
            tracing::debug!(path = %self.mirror_list.display(), "no mirror list file");
        }
        Ok(mirrors)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            port: default_port(),
            listen_host: None,
            nickname: String::new(),
            default_channel: default_channel(),
            channel_capacity: default_channel_capacity(),
            mirror_list: default_mirror_list(),
            mirrors: Vec::new(),
            poll_interval_secs: default_poll_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            bootstrap_attempts: default_bootstrap_attempts(),
            bootstrap_backoff_ms: default_bootstrap_backoff_ms(),
            enable_tls: false,
            tls_dir: default_tls_dir(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

// ── Mirror list ────────────────────────────────────────────────────────

/// Parse `host:port++nickname` lines. Blank lines and `#` comments are
/// skipped; a line without `++` uses its address as the nickname.
pub fn parse_mirror_list(text: &str) -> Result<Vec<Node>, NodeError> {
    let mut mirrors = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (address, nickname) = match line.split_once("++") {
            Some((address, nickname)) => (address.trim(), nickname.trim()),
            None => (line, line),
        };
        mirrors.push(Node::from_address(address, nickname)?);
    }
    Ok(mirrors)
}

pub fn load_mirror_list(path: &Path) -> Result<Vec<Node>, NodeError> {
    let content = std::fs::read_to_string(path)?;
    parse_mirror_list(&content)
}
