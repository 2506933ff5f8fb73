mod api;
mod config;
mod constants;
mod discovery;
mod error;
mod http_client;
mod intensity;
mod poll;
mod proximity;
mod raster;
mod report;
mod rings;
mod storage;
mod types;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use reqwest::Client;
use tokio::sync::{watch, RwLock};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{healthz, latest};
use crate::config::Config;
use crate::poll::{wait_for_shutdown, PollLoop};
use crate::raster::FmiRadarSource;
use crate::report::HttpReporter;
use crate::types::AppState;
use crate::utils::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = Arc::new(Config::from_env().context("Failed to load configuration")?);
    info!(
        "Monitoring {}x{} px around ({}, {}) via {} WMS endpoint",
        cfg.image_edge_pixels(),
        cfg.image_edge_pixels(),
        cfg.site_x,
        cfg.site_y,
        if cfg.api_key.is_some() { "keyed" } else { "open" }
    );

    let http = Client::builder()
        .timeout(cfg.request_timeout)
        .user_agent("radar-safety-rs/1.0")
        .build()
        .context("Failed to build reqwest client")?;

    let state = AppState {
        latest: Arc::new(RwLock::new(None)),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/latest", get(latest))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.listen_addr))?;
    info!("Radar status API listening on {}", cfg.listen_addr);
    let server_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for_shutdown(server_shutdown))
            .await
    });

    let source = FmiRadarSource::new(cfg.clone(), http.clone());
    let sink = HttpReporter::new(http, cfg.report_url.clone(), cfg.report_timeout);
    let mut poller = PollLoop::new(cfg.clone(), source, sink, state.latest.clone());
    poller.run(shutdown_rx).await;

    server
        .await
        .context("Status API task panicked")?
        .context("Status API failed")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
