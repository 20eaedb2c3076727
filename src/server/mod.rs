// src/server/mod.rs

//! HTTP listener lifecycle: startup, the routing surface, and graceful
//! shutdown with a bounded drain.

use crate::config::Config;
use crate::core::metrics::gather_metrics;
use crate::core::netrc;
use crate::core::resolver::OriginResolver;
use crate::core::router::{self, AppState};
use crate::core::toolchain::GoToolchain;
use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

// Platform-specific signal handling imports
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Builds the daemon's routing surface. Everything except `/metrics` flows
/// through the fallback dispatcher; only GET is served.
pub fn build_router(state: Arc<AppState>, metrics_enabled: bool) -> Router {
    let mut app = Router::new();
    if metrics_enabled {
        app = app.route("/metrics", get(metrics_handler));
    }
    app.fallback(router::dispatch).with_state(state)
}

async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}

/// Waits for a shutdown signal based on the operating system.
/// On Unix, it listens for SIGINT and SIGTERM.
/// On Windows, it listens for Ctrl+C.
async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to create SIGINT stream");
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to create SIGTERM stream");
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
            _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
        }
    }
    #[cfg(windows)]
    {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, initiating graceful shutdown.");
    }
}

/// The main daemon startup function: bootstrap, bind, serve until signaled.
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;

    match netrc::write_netrc().await {
        Ok(true) => info!(".netrc written from environment credentials"),
        Ok(false) => {}
        Err(e) => warn!("failed to write .netrc: {e}"),
    }

    tokio::fs::create_dir_all(config.download_root())
        .await
        .with_context(|| format!("Failed to create download root {:?}", config.download_root()))?;

    let resolver: Arc<dyn OriginResolver> = Arc::new(GoToolchain::new(config.cachedir.clone()));
    let state = Arc::new(AppState::new(&config, resolver)?);
    let app = build_router(state, config.metrics.enabled);

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind listener on {}", config.listen))?;
    info!("modproxy listening on {}", listener.local_addr()?);
    match &config.proxy {
        Some(proxy) => info!("upstream proxy: {proxy}"),
        None => info!("running in direct mode (no upstream proxy)"),
    }

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        await_shutdown_signal().await;
        let _ = signal_tx.send(());
    });

    let mut drain_rx = shutdown_tx.subscribe();
    let serve = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_rx.recv().await.ok();
    })
    .into_future();

    // Drain in-flight requests after the signal, but only within the grace
    // window; a hung request must not wedge shutdown.
    tokio::select! {
        result = serve => result.context("server error")?,
        _ = async {
            drain_rx.recv().await.ok();
            tokio::time::sleep(config.shutdown_grace).await;
        } => {
            warn!(
                "drain deadline of {:?} exceeded, aborting in-flight requests",
                config.shutdown_grace
            );
        }
    }

    info!("modproxy shut down");
    Ok(())
}
