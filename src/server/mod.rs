//! HTTP API server for the vector store.

pub mod routes;

use crate::hnsw::HnswAdapter;
use crate::index::AnnIndex;
use crate::metrics::MetricsCollector;
use crate::store::VectorStore;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// Shared application state for the HTTP server.
pub struct AppState<I: AnnIndex> {
    pub store: VectorStore<I>,
    pub metrics: RwLock<MetricsCollector>,
}

/// Start the HTTP server around an existing store.
pub async fn start(addr: &str, store: VectorStore<HnswAdapter>) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        store,
        metrics: RwLock::new(MetricsCollector::new()),
    });

    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
