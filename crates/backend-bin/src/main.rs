use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use enrol_backend_lib::{config::Settings, logging, router, AppState};
use tokio::net::TcpListener;
use tokio::time::{interval, Duration};

/// Email-confirmed signup server
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the configured listen address
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Settings::load_from(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }

    logging::init_tracing(&config.log_level, config.log_json)?;

    let addr = config.bind_addr;
    let state = Arc::new(AppState::from_settings(config)?);

    // Session cleanup every 15 minutes
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(15 * 60));
        loop {
            interval.tick().await;
            sessions.cleanup_expired().await;
        }
    });

    // Replay ledger cleanup every hour
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(60 * 60));
        loop {
            interval.tick().await;
            let now = cleanup_state.clock.now();
            match cleanup_state.users.purge_consumed_tokens(now).await {
                Ok(0) => {},
                Ok(removed) => tracing::info!(removed, "purged expired confirmation tokens"),
                Err(e) => tracing::error!(error = %e, "confirmation token purge failed"),
            }
        }
    });

    let app = router::create_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
