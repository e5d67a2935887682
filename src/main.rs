use anyhow::{Context, Result};
use clap::Parser;
use reddit_rss::config::{Config, DEFAULT_CONFIG_PATH};
use reddit_rss::feed::system_clock;
use reddit_rss::server::{router, AppState};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "reddit-rss", about = "RSS feeds for Reddit listings with inlined article content")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Listen address, overriding the config file and PORT
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    config.apply_env(|name| std::env::var(name).ok());
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    config.validate().context("Invalid configuration")?;
    tracing::debug!(config = ?config, "Effective configuration");

    let state = AppState::from_config(&config, system_clock())
        .context("Failed to set up article fetcher")?;

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    tracing::info!(
        addr = %listener.local_addr()?,
        upstream = %config.upstream_url,
        mirror = %config.mirror_url,
        "Listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
