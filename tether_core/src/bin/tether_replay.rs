//! Replay recorded extension-host SCM traffic against the core model.
//!
//! Input is newline-delimited JSON, one protocol message per line (see
//! `tether_api::ScmMessage`). Local repositories can be published alongside
//! with `--repo`. The resulting providers are printed as JSON snapshots.

use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tether_api::{ScmMessage, SourceControlHandle};
use tether_core::config::CoreConfig;
use tether_core::git::GitCommandRunner;
use tether_core::scm::{LocalSourceControl, MainThreadScm, ProviderSnapshot};
use tether_core::telemetry::init_tracing;
use tether_hosts::{GitCliConfig, GitCliHost, MemoryComments};
use tracing::{info, warn, Level};
use url::Url;

/// Handles for `--repo` start here so they do not collide with recorded ones.
const LOCAL_HANDLE_BASE: u32 = 10_000;

#[derive(Parser)]
#[command(name = "tether-replay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Replay SCM protocol messages and print provider snapshots", long_about = None)]
struct Cli {
    /// Message log (newline-delimited JSON); `-` reads stdin
    #[arg(default_value = "-")]
    messages: PathBuf,

    /// Publish the repository at this path as a local source control
    #[arg(long = "repo")]
    repos: Vec<PathBuf>,

    /// TOML file with core settings
    #[arg(long, env = "TETHER_CONFIG")]
    config: Option<PathBuf>,

    /// Resolve each provider's canonical remote URL through git
    #[arg(long)]
    remotes: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplayOutput {
    #[serde(flatten)]
    snapshot: ProviderSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(
        cli.json,
        if cli.verbose { Level::DEBUG } else { Level::INFO },
    );

    let config = load_config(cli.config.as_deref())?;
    let host = Arc::new(GitCliHost::with_config(GitCliConfig::from_env()));
    let comments = Arc::new(MemoryComments::new());
    let mut bridge = MainThreadScm::new(config, host.clone(), comments);

    for (offset, path) in cli.repos.iter().enumerate() {
        let handle = SourceControlHandle(LOCAL_HANDLE_BASE + u32::try_from(offset)?);
        let local = LocalSourceControl::open(handle, path)
            .with_context(|| format!("failed to open repository {}", path.display()))?;
        host.register_root(handle, local.repository().root());
        local
            .publish(&mut bridge)
            .with_context(|| format!("failed to publish {}", path.display()))?;
    }

    let mut applied = 0usize;
    for (index, line) in read_lines(&cli.messages)?.into_iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let message: ScmMessage = serde_json::from_str(&line)
            .with_context(|| format!("invalid message on line {}", index + 1))?;
        if let ScmMessage::RegisterSourceControl {
            handle,
            root_uri: Some(root_uri),
            ..
        } = &message
        {
            match Url::parse(root_uri).ok().and_then(|url| url.to_file_path().ok()) {
                Some(root) => host.register_root(*handle, root),
                None => warn!(%handle, root_uri = %root_uri, "root is not a local file uri, commands will fail"),
            }
        }
        if let Err(err) = bridge.dispatch(message) {
            warn!(line = index + 1, error = %err, "message rejected");
        }
        applied += 1;
    }
    bridge.drain_signals();
    info!(applied, providers = bridge.service().len(), "replay finished");

    let mut output = Vec::new();
    for repository in bridge.service().repositories() {
        let provider = repository.provider();
        let remote = if cli.remotes {
            match GitCommandRunner::for_provider(provider)
                .canonical_remote_url()
                .await
            {
                Ok(remote) => Some(remote),
                Err(err) => {
                    warn!(provider = provider.id(), error = %err, "remote lookup failed");
                    None
                }
            }
        } else {
            None
        };
        output.push(ReplayOutput {
            snapshot: provider.snapshot(),
            remote,
        });
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<CoreConfig> {
    let config = match path {
        Some(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            CoreConfig::from_toml_str(&source)?
        }
        None => CoreConfig::default(),
    };
    Ok(config.with_env_overrides())
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let reader: Box<dyn Read> = if path.as_os_str() == "-" {
        Box::new(io::stdin())
    } else {
        Box::new(
            fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        )
    };
    BufReader::new(reader)
        .lines()
        .collect::<io::Result<Vec<_>>>()
        .context("failed to read messages")
}
