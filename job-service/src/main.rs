//! `reposcribe-jobd` entry point.
//!
//! Per-user service that runs repository report jobs in the background.
//!
//! ## Modes
//!
//! - **Service mode** (default): load config, bind the socket, accept
//!   connections until Ctrl+C.
//! - **`--ping`**: connect to a running service, send the hello
//!   handshake, print its version, then exit.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use reposcribe_core::ReposcribeConfig;
use reposcribe_job_service::client::ServiceClient;
use reposcribe_job_service::engine::JobEngine;
use reposcribe_job_service::manager::JobManager;

#[derive(Debug, Parser)]
#[command(name = "reposcribe-jobd", version, about = "Repository report job service")]
struct Args {
    /// Socket path (defaults to $XDG_RUNTIME_DIR/reposcribe.sock).
    #[arg(long = "socket", env = "REPOSCRIBE_SOCKET")]
    socket: Option<PathBuf>,

    /// Config file (defaults to ~/.config/reposcribe/config.toml).
    #[arg(long = "config", short = 'c')]
    config: Option<PathBuf>,

    /// Directory reports are written to.
    #[arg(long = "reports-dir")]
    reports_dir: Option<PathBuf>,

    /// Check that a service is listening, then exit.
    #[arg(long = "ping")]
    ping: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ReposcribeConfig::load_from_path(path),
        None => ReposcribeConfig::load(),
    }
    .context("loading configuration")?;
    if let Some(dir) = args.reports_dir {
        config.service.reports_dir = dir;
    }

    let socket_path = reposcribe_job_service::resolve_socket_path(
        args.socket.as_deref(),
        config.service.socket_path.as_deref(),
    );

    if args.ping {
        let client = ServiceClient::connect(&socket_path).await?;
        println!(
            "reposcribe-jobd v{} is alive at {}",
            client.service_info().service_version,
            socket_path.display()
        );
        return Ok(());
    }

    tracing::info!("reposcribe-jobd v{} starting", env!("CARGO_PKG_VERSION"));

    let engine = JobEngine::from_config(&config, None).context("configuring inference client")?;
    tracing::info!(reports_dir = %engine.reports_dir().display(), "Reports directory");
    let manager = Arc::new(JobManager::new(engine, &config.service));

    let listener = reposcribe_job_service::ipc::bind(&socket_path)
        .with_context(|| format!("binding {}", socket_path.display()))?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let mgr_signal = Arc::clone(&manager);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!(
            "Signal received, shutting down (running jobs: {})",
            mgr_signal.registry().running_count().await
        );
        let _ = shutdown_tx.send(true);
    });

    reposcribe_job_service::ipc::serve(manager, listener, shutdown_rx).await?;

    if let Err(e) = std::fs::remove_file(&socket_path) {
        tracing::debug!("Socket cleanup skipped: {e}");
    }
    tracing::info!("reposcribe-jobd exiting cleanly");
    Ok(())
}
