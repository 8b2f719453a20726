//! Client configuration, deserialized from TOML.
//!
//! ```toml
//! [server]
//! command = "rust-analyzer"
//! language_id = "rust"
//! root = "/home/me/project"
//!
//! [client]
//! max_frame_bytes = 8388608
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::codec::MAX_FRAME_BYTES;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct LspConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

impl LspConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {:?}: {}", path, source);
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| {
            tracing::warn!("Failed to parse config at {:?}: {}", path, source);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

/// How to launch the language server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Executable command (e.g. "rust-analyzer").
    pub command: String,
    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,
    /// LSP language identifier used in `didOpen` (e.g. "rust", "python").
    pub language_id: String,
    /// Workspace root; also the server's working directory.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Extra environment variables for the server process.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Engine tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Frames with a larger `Content-Length` are rejected as framing errors.
    pub max_frame_bytes: usize,
    /// Reported as `clientInfo.name` during the handshake.
    pub client_name: String,
    pub client_version: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: MAX_FRAME_BYTES,
            client_name: String::from("lspc"),
            client_version: None,
        }
    }
}
