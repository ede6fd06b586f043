//! HTTP server setup and operational endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use pyindex_core::{FileStore, IndexEngine};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{config::Config, files, simple, state::AppState, upload, AppResult};

/// Build the application router. All routes are mounted under the
/// configured URL prefix.
pub fn build_router(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route("/simple", get(simple::root_redirect))
        .route("/simple/", get(simple::project_root))
        .route("/simple/{project}", get(simple::project_redirect))
        .route("/simple/{project}/", get(simple::project_index))
        .route("/files/{project}/{filename}", get(files::download_file))
        .route("/legacy", post(upload::upload_package))
        .route("/legacy/", post(upload::upload_package))
        .route("/ping", get(ping_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .layer(DefaultBodyLimit::max(state.config.max_upload_size_bytes()));

    let app = if state.url_prefix.is_empty() {
        routes
    } else {
        Router::new().nest(&state.url_prefix, routes)
    };

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Open the store described by `config` and wrap it in an engine.
pub async fn build_state(config: Config) -> Result<Arc<AppState>> {
    let store = FileStore::open(&config.storage.root).await.map_err(|e| {
        error!(root = %config.storage.root.display(), error = %e, "Failed to open storage root");
        anyhow::anyhow!(
            "Failed to open storage root {}: {}",
            config.storage.root.display(),
            e
        )
    })?;

    let engine = if config.storage.listing_cache {
        IndexEngine::new(store)
    } else {
        IndexEngine::without_cache(store)
    };
    Ok(Arc::new(AppState::new(engine, config)))
}

pub async fn run_server(config: Config) -> Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;

    let addr: SocketAddr = format!("{}:{}", host, port).parse().map_err(|e| {
        error!(host = %host, port = %port, error = %e, "Invalid socket address");
        anyhow::anyhow!("Invalid socket address {}:{}: {}", host, port, e)
    })?;

    let state = build_state(config).await?;
    info!(
        root = %state.engine.store().root().display(),
        url_prefix = %state.url_prefix,
        listing_cache = state.engine.cache_enabled(),
        duplicate_policy = ?state.config.uploads.duplicate_policy,
        "Starting pyindex server"
    );
    let app = build_router(state);

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        error!(addr = %addr, error = %e, "Failed to bind to address");
        anyhow::anyhow!("Failed to bind to {}:{}: {}", host, port, e)
    })?;

    info!("Server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!(error = %e, "Server error");
            anyhow::anyhow!("Server error: {}", e)
        })?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Liveness probe.
async fn ping_handler() -> Json<Value> {
    Json(json!({}))
}

async fn health_handler() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

async fn status_handler(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let projects = state.engine.list_projects().await?;
    Ok(Json(json!({
        "status": "ok",
        "service": "pyindex",
        "version": env!("CARGO_PKG_VERSION"),
        "storage_root": state.engine.store().root().display().to_string(),
        "projects": projects.len(),
        "listing_cache": state.engine.cache_enabled(),
    })))
}
