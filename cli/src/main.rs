//! `lspc` - spawn a language server, open files in it, and print what it says.
//!
//! ```text
//! lspc <config.toml> [FILE...]
//! ```
//!
//! Every inbound message is written to stdout as one JSON line. Logs go to
//! stderr and are filtered with `RUST_LOG`. Ctrl-C stops listening and shuts
//! the server down.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use lspc::{Engine, LspConfig, MessageSender, Notification, StopReason, spawn_server};
use lspc_types::{ClientCapabilities, ClientInfo, DidOpenTextDocumentParams, InitializeParams, TextDocumentItem};
use serde_json::Value;
use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use url::Url;

const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

const USAGE: &str = "usage: lspc <config.toml> [FILE...]";

#[derive(Debug, PartialEq, Eq)]
struct Args {
    config: PathBuf,
    files: Vec<PathBuf>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let Some(config) = args.next() else {
            bail!(USAGE);
        };
        if config == "-h" || config == "--help" {
            bail!(USAGE);
        }
        Ok(Self {
            config: PathBuf::from(config),
            files: args.map(PathBuf::from).collect(),
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // stdout carries protocol output; logs must stay on stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn print_message(message: Value) {
    println!("{message}");
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("resolving {}", path.display()))
}

fn directory_uri(dir: &Path) -> Result<Url> {
    Url::from_directory_path(dir).map_err(|()| anyhow!("{} is not an absolute path", dir.display()))
}

fn file_uri(file: &Path) -> Result<Url> {
    Url::from_file_path(file).map_err(|()| anyhow!("{} is not an absolute path", file.display()))
}

fn initialize_params(config: &LspConfig, root: &Path) -> Result<InitializeParams> {
    let root_uri = directory_uri(root)?;
    let folder_name = root
        .file_name()
        .map_or_else(|| root.display().to_string(), |n| n.to_string_lossy().into_owned());

    Ok(InitializeParams::new(Some(std::process::id()), Some(root_uri.to_string()))
        .with_client_info(ClientInfo::new(
            &config.client.client_name,
            config.client.client_version.clone(),
        ))
        .with_capabilities(ClientCapabilities::default())
        .with_workspace_folder(root_uri.as_str(), folder_name))
}

async fn open_document(sender: &MessageSender, path: &Path, language_id: &str) -> Result<()> {
    let path = absolute(path)?;
    let text = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let uri = file_uri(&path)?;

    let params = DidOpenTextDocumentParams {
        text_document: TextDocumentItem::new(uri.as_str(), language_id, 1, text),
    };
    sender.send(&Notification::did_open(&params)?).await?;
    tracing::info!(uri = %uri, "Opened document");
    Ok(())
}

/// `shutdown` then `exit`, then give the process a moment before killing it.
///
/// The listen loop is already stopped, so the `shutdown` response is not awaited.
async fn shutdown(sender: &MessageSender, child: &mut Child) {
    if let Err(e) = sender.send_request(lspc::protocol::SHUTDOWN, None).await {
        tracing::debug!("Failed to send shutdown: {e}");
    } else {
        let _ = sender.send(&Notification::exit()).await;
    }

    let wait = tokio::time::timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), child.wait()).await;
    if wait.is_err() {
        tracing::debug!("Language server didn't exit in time, killing");
        let _ = child.kill().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse(env::args().skip(1))?;
    let config = LspConfig::load(&args.config)?;

    let root = match &config.server.root {
        Some(root) => absolute(root)?,
        None => env::current_dir().context("reading current directory")?,
    };

    let (mut child, transport) = spawn_server(&config.server)?;
    let mut engine = Engine::new(transport, print_message).with_config(&config.client);
    let sender = engine.sender();

    engine
        .initialize(&initialize_params(&config, &root)?)
        .await
        .context("LSP initialize failed")?;

    for file in &args.files {
        open_document(&sender, file, &config.server.language_id).await?;
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted");
                cancel.cancel();
            }
        }
    });

    match engine.listen(cancel).await {
        Ok(StopReason::Cancelled) => shutdown(&sender, &mut child).await,
        Ok(StopReason::EndOfStream) => {
            let _ = child.wait().await;
        }
        Err(e) => {
            shutdown(&sender, &mut child).await;
            return Err(e).context("LSP connection failed");
        }
    }

    Ok(())
}
