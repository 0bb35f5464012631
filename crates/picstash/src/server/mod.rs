//! HTTP front end.
//!
//! - `POST /images`: JSON array of URLs / data URIs, or a multipart form
//! - `GET /ping`: liveness check
//!
//! The server stops gracefully on Ctrl+C or SIGTERM.

mod multipart;
mod routes;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use picstash_core::config::UploadConfig;
use picstash_core::{Config, Ingestor};
use tower_http::trace::TraceLayer;

/// Shared state of all handlers.
pub struct AppState {
    pub ingestor: Ingestor,
    pub upload: UploadConfig,
    /// Request body cap, enforced by the handlers
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(ingestor: Ingestor, upload: UploadConfig, max_body_bytes: usize) -> Self {
        Self {
            ingestor,
            upload,
            max_body_bytes,
        }
    }
}

/// Build the router.
///
/// The extractor body limit is off: `POST /images` counts body bytes
/// itself so that a form overrunning the limit still gets a response for
/// the parts read so far.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/images", post(routes::ingest_images))
        .route("/ping", get(routes::ping))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and block until it is shut down.
pub async fn start_server(config: Config) -> anyhow::Result<()> {
    let ingestor = Ingestor::from_config(&config)?;
    ingestor.ensure_dirs()?;

    let max_body_bytes = usize::try_from(config.server.max_body_size_bytes()).unwrap_or(usize::MAX);
    tracing::info!(
        "Storing images in {} (max body: {}MB, max part: {}MB, max file: {}MB)",
        ingestor.images_dir().display(),
        config.server.max_body_size_mb,
        config.upload.max_part_size_mb,
        config.limits.max_file_size_mb
    );

    let state = Arc::new(AppState::new(
        ingestor,
        config.upload.clone(),
        max_body_bytes,
    ));
    let app = build_router(state);

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    tracing::info!("Starting Picstash server on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
