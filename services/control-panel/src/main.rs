//! Leigod auto-pause control panel
//!
//! Single-binary service that:
//! 1. Loads config (TOML + env) and verifies an initial token if present
//! 2. Polls the vendor usage log on an interval and auto-pauses the
//!    account past the configured threshold
//! 3. Serves a small web panel for token updates and manual pause
//! 4. Exposes /health and Prometheus /metrics

mod config;
mod metrics;
mod panel;

use std::sync::Arc;

use anyhow::{Context, Result};
use autopause::{Monitor, Scheduler};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use leigod_api::AccountClient;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::panel::PanelState;

/// Build the service router: panel routes plus health and metrics, behind
/// a concurrency limit.
fn build_router(state: PanelState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(panel::routes())
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting leigod-autopause control panel");

    // Install the Prometheus recorder before any counter is touched
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        check_interval_minutes = config.monitor.check_interval_minutes,
        warning_threshold_minutes = config.monitor.warning_threshold_minutes,
        pause_threshold_minutes = config.monitor.pause_threshold_minutes,
        "configuration loaded"
    );

    let http = leigod_api::build_http_client().context("failed to build HTTP client")?;
    let notifier = notify::from_sendkey(http.clone(), config.sendkey());
    let client = Arc::new(AccountClient::new(http, notifier.clone()));
    let monitor = Arc::new(Monitor::new(client, notifier, config.thresholds()));
    let scheduler = Arc::new(Scheduler::new(config.check_interval()));

    // Verify the configured token and arm the poll loop. A rejected token
    // is not fatal — the operator fixes it through the panel.
    if let Some(token) = config.initial_token() {
        match monitor.set_token(token.expose()).await {
            Ok(account) => {
                info!(account = %account.nickname, "initial token verified");
                let status = scheduler.start(monitor.clone()).await;
                info!(scheduler = status.label(), "initial poll loop state");
            }
            Err(e) => {
                warn!(error = %e, "initial token rejected, waiting for the operator");
            }
        }
    } else {
        info!("no initial token configured, waiting for the operator");
    }

    let state = PanelState::new(monitor, scheduler.clone(), prometheus_handle);
    let app = build_router(state, config.server.max_connections);

    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.server.listen_addr))?;

    info!(addr = %config.server.listen_addr, "control panel listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    scheduler.stop().await;
    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: scheduler state, token presence, last poll outcome,
/// uptime. Always 200 — a missing token is a valid idle state, not an
/// unhealthy service.
async fn health_handler(State(state): State<PanelState>) -> impl IntoResponse {
    let uptime = state.started_at.elapsed().as_secs();
    let snapshot = state.monitor.status().await;
    let scheduler = state.scheduler.status().await;
    let token_held = state.monitor.has_token().await;

    let body = serde_json::json!({
        "status": "ok",
        "scheduler": scheduler.label(),
        "token_held": token_held,
        "state": snapshot.state.label(),
        "elapsed_minutes": snapshot.elapsed_minutes,
        "last_poll_at": snapshot.updated_at,
        "uptime_seconds": uptime,
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint — text exposition format.
async fn metrics_handler(State(state): State<PanelState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
