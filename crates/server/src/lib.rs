//! Dev Radar Server Library
//!
//! Developer registry with GitHub enrichment, proximity search by tech and
//! live pushes of new registrations over WebSocket.

pub mod core;
pub mod handlers;
pub mod models;
pub mod realtime;
pub mod store;

use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Router};
use radar_github::GithubClient;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub use crate::core::{AppState, ServerConfig};
use store::DevStore;

/// Router with all routes and layers, ready to serve.
pub fn app(state: AppState) -> Router {
    crate::core::router()
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

pub async fn run() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        // Already set, ignore
    }

    info!("=== Dev Radar Server ===");

    let config = ServerConfig::from_env();
    config.ensure_dirs()?;
    info!("Data root: {:?}", config.data_root);

    let store = DevStore::connect(&config.database_url, config.db_max_connections)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    let github = GithubClient::with_config(config.github.clone())
        .context("Failed to build GitHub client")?;
    info!("GitHub API: {}", config.github.api_url);

    let bind_addr = config.bind_addr;
    info!(
        "Search radius: {} km, room cell: {}°",
        config.search_radius_km, config.cell_degrees
    );

    let state = AppState::new(config, store, Arc::new(github));
    let app = app(state);

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    info!("Server running on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn health_check() -> &'static str {
    "OK - Dev Radar"
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
