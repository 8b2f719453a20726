//! Spawning the language server subprocess.
//!
//! Only spawning lives here. Waiting, killing and restart policy belong to
//! whoever owns the returned [`Child`].

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::{Child, Command};

use crate::config::ServerConfig;
use crate::transport::StdioTransport;

/// Spawn the configured server with piped stdio and wrap its pipes in a transport.
///
/// Stderr is discarded so server chatter can't block on a full pipe.
/// The child is killed when its handle is dropped.
pub fn spawn_server(config: &ServerConfig) -> Result<(Child, StdioTransport)> {
    let resolved_cmd = which::which(&config.command)
        .with_context(|| format!("{} not found in PATH", config.command))?;

    let mut cmd = Command::new(&resolved_cmd);
    cmd.args(&config.args)
        .envs(&config.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    if let Some(root) = &config.root {
        cmd.current_dir(root);
    }

    tracing::debug!(command = %resolved_cmd.display(), args = ?config.args, "Starting language server");

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning {}", config.command))?;
    let transport = StdioTransport::from_child(&mut child)?;

    Ok((child, transport))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn server(command: &str, args: &[&str]) -> ServerConfig {
        ServerConfig {
            command: command.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            language_id: "plaintext".to_string(),
            root: None,
            env: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let err = spawn_server(&server("nonexistent_lsp_12345", &[])).unwrap_err();
        assert!(format!("{err:#}").contains("not found in PATH"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawned_child_echoes_through_transport() {
        use crate::transport::{Transport, TransportReader, TransportWriter};

        let (mut child, transport) = spawn_server(&server("cat", &[])).unwrap();
        let (mut reader, mut writer) = transport.into_split();

        writer.write_bytes(b"Content-Length: 2\r\n").await.unwrap();
        writer.flush().await.unwrap();
        assert_eq!(reader.read_line().await.unwrap(), b"Content-Length: 2\r\n");

        drop(writer);
        assert!(reader.read_line().await.is_err());
        let _ = child.wait().await;
    }
}
