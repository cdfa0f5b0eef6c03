//! JSON API over the document store, plain files and the search index.
//!
//! Every write holds the store mutex while it touches disk and then
//! updates the index, so index and store never diverge on writes made here.

mod error;
mod routes;

pub use error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::sync::{Mutex, RwLock};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::config::SearchConfig;
use crate::documents::{DocumentStore, FileTree};
use crate::search::SearchIndex;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<DocumentStore>>,
    pub files: FileTree,
    pub index: Arc<RwLock<SearchIndex>>,
    pub search: SearchConfig,
}

impl AppState {
    pub fn new(store: DocumentStore, index: Arc<RwLock<SearchIndex>>, search: SearchConfig) -> Self {
        Self {
            files: FileTree::new(store.root()),
            store: Arc::new(Mutex::new(store)),
            index,
            search,
        }
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/search", get(routes::search))
        .route(
            "/api/capsules",
            get(routes::list_capsules).post(routes::save_capsule),
        )
        .route(
            "/api/capsules/{id}",
            axum::routing::delete(routes::delete_capsule),
        )
        .route("/api/capsules/{id}/archive", post(routes::archive_capsule))
        .route(
            "/api/capsules/{id}/unarchive",
            post(routes::unarchive_capsule),
        )
        .route("/api/capsules/{id}/history", get(routes::capsule_history))
        .route("/api/versions/{base}", get(routes::list_versions))
        .route("/api/restore/{base}", post(routes::restore_version))
        .route("/api/files/{*folder}", get(routes::list_files))
        .route(
            "/api/file/{*path}",
            get(routes::read_file)
                .post(routes::write_file)
                .delete(routes::delete_file),
        )
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

/// Serve `router(state)` on `bind` until Ctrl+C.
pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    crate::log_event!("http", "listening", "http://{bind}");
    eprintln!("Listening on http://{bind} (Ctrl+C to stop)");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    crate::log_event!("http", "stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(target: "http", "failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
