//! cairn worker binary.

use anyhow::{Context, Result};
use cairn_core::config::AppConfig;
use cairn_worker::{GatewayClientFactory, ServiceWorker, WorkerState};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// cairn - content-addressed retrieval worker
#[derive(Parser, Debug)]
#[command(name = "cairnd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "CAIRN_CONFIG", default_value = "config/worker.toml")]
    config: String,

    /// Construct the network client at startup instead of on first use
    #[arg(long)]
    eager: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("cairn v{}", env!("CARGO_PKG_VERSION"));

    // The file is optional; defaults cover a local setup
    let mut figment = Figment::new();
    if std::path::Path::new(&args.config).exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::info!("No config file found at {}, using defaults", args.config);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("CAIRN_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;

    let factory = Arc::new(GatewayClientFactory::new(config.network.clone()));
    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    let worker = ServiceWorker::new(WorkerState::new(config, factory));

    if args.eager {
        let handle = worker.state().handle.clone();
        tokio::spawn(async move {
            if let Err(e) = handle.acquire().await {
                tracing::warn!(error = %e, "Eager client construction failed, will retry on demand");
            }
        });
    }

    let app = worker.router();

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
