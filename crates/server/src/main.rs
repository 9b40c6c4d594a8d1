//! Conduit server binary.

use anyhow::{Context, Result};
use clap::Parser;
use conduit_core::config::AppConfig;
use conduit_server::{Dispatcher, IpcServer, ServerState};
use conduit_storage::{FileAccess, LocalFileAccess};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Conduit - build tool IPC server
#[derive(Parser, Debug)]
#[command(name = "conduitd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "CONDUIT_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Conduit v{}", env!("CARGO_PKG_VERSION"));

    // The config file is optional: every section has defaults and
    // CONDUIT_-prefixed environment variables override individual keys.
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("CONDUIT_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;

    conduit_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let persistent_cache = conduit_storage::hash_cache_from_config(&config.hash_cache)
        .context("failed to initialize hash cache")?;
    match &persistent_cache {
        Some(cache) => {
            tracing::info!(backend = cache.backend_name(), "Persistent hash cache configured")
        }
        None => tracing::warn!("Persistent hash cache disabled, every miss is hashed locally"),
    }

    let file_access: Arc<dyn FileAccess> =
        Arc::new(LocalFileAccess::new(config.server.build_hash_type));

    let state = ServerState::new(config, file_access, persistent_cache);
    let statistics = state.statistics.clone();
    let server = IpcServer::bind(Dispatcher::new(state)).context("failed to bind IPC socket")?;

    server
        .serve(shutdown_signal())
        .await
        .context("IPC server failed")?;

    statistics.log_table();
    conduit_server::metrics::log_final_counters();
    tracing::info!("Conduit stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
