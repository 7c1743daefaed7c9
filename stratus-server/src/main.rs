//! Stratus Server - Headless Daemon
//!
//! A pure Rust HTTP server that:
//! - Proxies One Call weather requests across a pool of upstream
//!   credentials on /data/3.0/onecall
//! - Shares per-day quota and error state across workers through Redis
//! - Provides cache administration, stats and health endpoints

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use stratus_core::ledger::RedisLedger;
use stratus_core::{Settings, WeatherService};

mod api;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env().context("failed to load configuration")?;

    let filter = EnvFilter::try_new(&settings.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(
        credentials = settings.credentials.len(),
        daily_limit = settings.daily_limit,
        cache_enabled = settings.enable_cache,
        "starting stratus server"
    );

    let ledger = RedisLedger::connect(&settings.effective_redis_url())
        .await
        .context("failed to connect to the usage ledger")?;

    let settings = Arc::new(settings);
    let service = WeatherService::new(&settings, Arc::new(ledger))
        .context("failed to build weather service")?;
    service.cache().start_sweeper();

    let state = AppState::new(service, settings.clone());
    let app = api::router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&settings.cors_origin));

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", settings.host, settings.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shutdown complete");
    Ok(())
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> =
            origin.split(',').filter_map(|o| o.trim().parse().ok()).collect();
        CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
    }
}

/// Resolves on SIGINT or SIGTERM. In-flight upstream calls drain up to
/// their own timeout; coalesced fetches are detached and complete their
/// side effects regardless.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
