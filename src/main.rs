//! CLI entry point for the download relay.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use relay_core::dispatch::{HostError, HostEvent, Notification};
use relay_core::rpc::validate_endpoint;
use relay_core::store::SettingsPatch;
use relay_core::{
    Bridge, BrowserHost, Daemon, DispatchEngine, DownloadId, EngineConfig, HistoryStatus,
    KeyValueStore, MemoryStore, RpcClient, SettingsStore, SqliteStore,
};
use tracing::{debug, info, warn};

mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.default_log_level()));

    // stdout carries host frames in serve mode, so logs always go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let backend: Arc<dyn KeyValueStore> = if args.is_memory_store() {
        Arc::new(MemoryStore::new())
    } else {
        let sqlite = SqliteStore::open(&args.store)
            .await
            .with_context(|| format!("failed to open store at {}", args.store.display()))?;
        Arc::new(sqlite)
    };
    let store = Arc::new(SettingsStore::new(backend));
    if let Err(e) = store.load().await {
        warn!(error = %e, "failed to load settings, using defaults");
    }

    if let Some(endpoint) = &args.endpoint {
        validate_endpoint(endpoint)?;
        store
            .update(SettingsPatch {
                endpoint_url: Some(endpoint.clone()),
                ..SettingsPatch::default()
            })
            .await?;
        info!(endpoint = %endpoint, "endpoint updated");
    }

    let daemon: Arc<dyn Daemon> = Arc::new(RpcClient::new(Duration::from_secs(args.timeout_secs))?);

    match args.command() {
        Command::Serve => {
            info!("download relay serving on stdio");
            let bridge = Bridge::new(store, daemon, EngineConfig::default());
            bridge.run(tokio::io::stdin(), tokio::io::stdout()).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check => {
            let endpoint = store.settings().endpoint_url;
            let health = daemon.check_health(&endpoint).await;
            println!("{}", serde_json::to_string_pretty(&health)?);
            Ok(if health.is_online() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Add { urls } => {
            let engine = DispatchEngine::new(store, daemon, Arc::new(LogHost));
            let outcomes = engine.add_many(&urls).await;
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
            let failed = outcomes
                .iter()
                .filter(|o| o.status == HistoryStatus::Error)
                .count();
            info!(total = outcomes.len(), failed, "batch complete");
            Ok(if failed == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::History => {
            println!("{}", serde_json::to_string_pretty(&store.history())?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Reset => {
            store.reset().await.context("failed to reset store")?;
            println!("Store reset to defaults");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Host for one-shot commands: there is no browser, so notifications are logged.
struct LogHost;

#[async_trait]
impl BrowserHost for LogHost {
    async fn cancel_download(&self, _id: DownloadId) -> Result<(), HostError> {
        Err(HostError::NoListener)
    }

    async fn erase_download(&self, _id: DownloadId) -> Result<(), HostError> {
        Err(HostError::NoListener)
    }

    fn show_notification(&self, notification: Notification) -> Result<(), HostError> {
        info!(kind = ?notification.kind, "{}", notification.message);
        Ok(())
    }

    fn emit(&self, _event: HostEvent) -> Result<(), HostError> {
        Err(HostError::NoListener)
    }
}
