use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use shelf_proxy::{GoodreadsFeed, router};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "shelf-proxy", version, about = "Goodreads shelf RSS to JSON proxy")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "SHELF_PROXY_BIND", default_value = "127.0.0.1:8787")]
    bind: SocketAddr,
    /// Base URL of the Goodreads site
    #[arg(long, env = "SHELF_PROXY_UPSTREAM", default_value = "https://www.goodreads.com")]
    upstream: String,
    /// Per-page upstream timeout (humantime, e.g. "10s")
    #[arg(long, env = "SHELF_PROXY_TIMEOUT", default_value = "10s", value_parser = humantime::parse_duration)]
    timeout: Duration,
    /// Maximum RSS pages walked when no page is requested
    #[arg(long, env = "SHELF_PROXY_MAX_PAGES", default_value_t = 20)]
    max_pages: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let feed = GoodreadsFeed::new(&args.upstream, args.timeout)?;
    let app = router(feed, args.max_pages);

    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind proxy listener on {}", args.bind))?;
    info!(addr = %args.bind, upstream = %args.upstream, "shelf proxy listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("shelf proxy exited")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut term) = signal(SignalKind::terminate()) {
            term.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown requested");
}
