//! Axum API server binary.

use std::net::SocketAddr;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vsess_api::{create_router, metrics, ApiConfig, AppState, SessionConfig};

const DEFAULT_LOG_DIRECTIVES: &str =
    "vsess_api=info,vsess_media=info,vsess_storage=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting vsess-api");

    let config = ApiConfig::from_env();
    let session_config = SessionConfig::from_env();
    info!(
        "API config: host={}, port={}, storage_root={}",
        config.host,
        config.port,
        session_config.storage_root.display()
    );
    if config.is_production() {
        info!("Production mode: internal error details are hidden from clients");
    }

    let state = AppState::new(config.clone(), &session_config)
        .await
        .context("failed to open storage")?;

    let report = state.session.readiness().await;
    if let Err(e) = &report.toolkit {
        warn!("Video tooling unavailable, requests will fail until it is installed: {}", e);
    }

    match state.session.restore(session_config.restore_on_startup).await {
        Ok(summary) => info!(
            "Startup restore: {} restored, {} stale staging files removed",
            summary.restored, summary.staging_removed
        ),
        Err(e) => error!("Startup restore failed: {}", e),
    }

    let metrics_handle = if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                error!("Failed to install metrics recorder: {}", e);
                None
            }
        }
    } else {
        None
    };

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Human readable output by default, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
