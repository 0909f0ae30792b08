//! Mirror configuration with TOML file support.

use serde::{Deserialize, Serialize};

use crate::MirrorError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Interface to bind.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// HTTP port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl MirrorConfig {
    pub fn from_toml_file(path: &str) -> Result<Self, MirrorError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| MirrorError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, MirrorError> {
        toml::from_str(s).map_err(|e| MirrorError::Config(e.to_string()))
    }

    /// `bind:port`, bracketing IPv6 literals.
    pub fn listen_address(&self) -> String {
        let bind = self.bind.trim();
        if bind.contains(':') && !bind.starts_with('[') {
            format!("[{bind}]:{}", self.port)
        } else {
            format!("{bind}:{}", self.port)
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}
