//! Toolgate Daemon
//!
//! Serves built-in tools over HTTP, accepting only calls signed with the key
//! derived for each endpoint.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use toolgate_auth::ensure_application_secret;
use toolgate_common::SecretStore;
use toolgate_daemon::{AppState, DaemonConfig, FileSecretStore, Result, serve};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (default: ~/.config/toolgate/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the bind address from the configuration file
    #[arg(long)]
    bind: Option<String>,
}

/// Initializes structured logging with tracing.
///
/// Supports two output formats via `TOOLGATE_LOG_FORMAT` environment variable:
/// - `json`: Machine-readable JSON logs (default for production)
/// - `pretty`: Human-readable formatted logs (default for development)
///
/// Log level is controlled via `RUST_LOG` environment variable.
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let format = std::env::var("TOOLGATE_LOG_FORMAT")
        .unwrap_or_else(|_| "pretty".to_string())
        .to_lowercase();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("toolgate_daemon=info,toolgate_auth=info,tower_http=info")
    });

    match format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .init();
        }
        _ => {
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing();

    info!("Starting toolgate daemon");

    let mut config = match DaemonConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            error!("Expected config at: {:?}", DaemonConfig::config_path());
            return Err(e);
        }
    };

    if let Some(bind) = args.bind {
        config.bind_address = bind;
        config.validate()?;
    }

    info!("Loaded configuration with {} endpoints", config.endpoints.len());

    let store = FileSecretStore::new(config.secret_path()?)?;
    let application_secret = if config.settings.generate_secret {
        Some(ensure_application_secret(&store)?)
    } else {
        let loaded = store.load()?;
        if loaded.is_none() {
            warn!(
                path = %store.path().display(),
                "No application secret found; every call will be refused until setup completes"
            );
        }
        loaded
    };

    let state = Arc::new(AppState::from_config(&config, application_secret.as_ref())?);

    // Create shutdown channel
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

    // Set up signal handlers
    let mut signals = Signals::new([SIGTERM, SIGINT])?;
    tokio::spawn(async move {
        use futures::stream::StreamExt;
        while let Some(signal) = signals.next().await {
            match signal {
                SIGTERM => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                    let _ = shutdown_tx.send(());
                    break;
                }
                SIGINT => {
                    info!("Received SIGINT, initiating graceful shutdown");
                    let _ = shutdown_tx.send(());
                    break;
                }
                _ => {}
            }
        }
    });

    let listener = TcpListener::bind(config.socket_addr()?).await?;

    info!("Daemon ready");

    serve(listener, state, async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    info!("Daemon shutdown complete");

    Ok(())
}
