//! HTTP route handlers for the vector store API.

use crate::error::StoreError;
use crate::index::AnnIndex;
use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

// --- Request/Response types ---

#[derive(Deserialize)]
pub struct InsertRequest {
    pub id: u64,
    pub vector: Vec<f32>,
}

#[derive(Deserialize)]
pub struct BatchRequest {
    pub items: Vec<InsertRequest>,
    #[serde(default = "default_validate")]
    pub validate: bool,
}

fn default_validate() -> bool {
    true
}

#[derive(Serialize)]
pub struct SkippedItem {
    pub id: u64,
    pub reason: String,
}

#[derive(Serialize)]
pub struct BatchResponse {
    pub accepted: Vec<u64>,
    pub skipped: Vec<SkippedItem>,
}

#[derive(Deserialize)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResultResponse {
    pub user_id: u64,
    pub distance: f32,
}

#[derive(Deserialize)]
pub struct SaveRequest {
    pub path: String,
}

#[derive(Deserialize)]
pub struct SearchQualityRequest {
    pub ef: usize,
}

#[derive(Serialize)]
pub struct LabelResponse {
    pub id: u64,
    pub label: u64,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub vector_count: usize,
    pub dimension: usize,
    pub capacity: usize,
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub total_searches: u64,
    pub total_inserts: u64,
    pub total_batch_items: u64,
    pub avg_search_latency_us: f64,
    pub p50_search_latency_us: f64,
    pub p95_search_latency_us: f64,
    pub p99_search_latency_us: f64,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(err: StoreError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        StoreError::DuplicateIdentifier { .. } => StatusCode::CONFLICT,
        StoreError::DimensionMismatch { .. } => StatusCode::BAD_REQUEST,
        StoreError::LabelOutOfRange { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

// --- Router ---

pub fn create_router<I: AnnIndex + std::fmt::Debug + 'static>(
    state: Arc<AppState<I>>,
) -> Router {
    Router::new()
        .route("/vectors", post(insert_vector::<I>))
        .route("/vectors/batch", post(insert_batch::<I>))
        .route("/vectors/{id}", get(get_label::<I>))
        .route("/search", post(search_vectors::<I>))
        .route("/save", post(save_store::<I>))
        .route("/search-quality", post(set_search_quality::<I>))
        .route("/health", get(health::<I>))
        .route("/metrics", get(get_metrics::<I>))
        .with_state(state)
}

// --- Handlers ---

async fn insert_vector<I: AnnIndex + std::fmt::Debug + 'static>(
    State(state): State<Arc<AppState<I>>>,
    Json(req): Json<InsertRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), (StatusCode, Json<ErrorResponse>)> {
    state
        .store
        .add_vector(req.id, &req.vector)
        .map_err(error_response)?;

    state.metrics.write().record_insert();

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": req.id, "status": "inserted"})),
    ))
}

async fn insert_batch<I: AnnIndex + std::fmt::Debug + 'static>(
    State(state): State<Arc<AppState<I>>>,
    Json(req): Json<BatchRequest>,
) -> Json<BatchResponse> {
    let batch: Vec<(u64, Vec<f32>)> =
        req.items.into_iter().map(|i| (i.id, i.vector)).collect();

    let report = state.store.try_add_vector_batch(&batch, req.validate);
    state.metrics.write().record_batch(report.accepted_count());

    Json(BatchResponse {
        accepted: report.accepted,
        skipped: report
            .skipped
            .into_iter()
            .map(|(id, reason)| SkippedItem {
                id,
                reason: reason.to_string(),
            })
            .collect(),
    })
}

async fn get_label<I: AnnIndex + std::fmt::Debug + 'static>(
    State(state): State<Arc<AppState<I>>>,
    Path(id): Path<u64>,
) -> Result<Json<LabelResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.store.lookup_label(id) {
        Some(label) => Ok(Json(LabelResponse { id, label })),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("vector not found: {}", id),
            }),
        )),
    }
}

async fn search_vectors<I: AnnIndex + std::fmt::Debug + 'static>(
    State(state): State<Arc<AppState<I>>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Vec<SearchResultResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let k = req.k.unwrap_or(10);

    let start = Instant::now();
    let results = state
        .store
        .search_vectors(&req.vector, k)
        .map_err(error_response)?;
    let elapsed = start.elapsed();

    state.metrics.write().record_search(elapsed);

    let response: Vec<SearchResultResponse> = results
        .into_iter()
        .map(|r| SearchResultResponse {
            user_id: r.user_id,
            distance: r.distance,
        })
        .collect();

    Ok(Json(response))
}

async fn save_store<I: AnnIndex + std::fmt::Debug + 'static>(
    State(state): State<Arc<AppState<I>>>,
    Json(req): Json<SaveRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)> {
    state.store.save(&req.path).map_err(error_response)?;
    Ok(Json(
        serde_json::json!({"path": req.path, "status": "saved"}),
    ))
}

async fn set_search_quality<I: AnnIndex + std::fmt::Debug + 'static>(
    State(state): State<Arc<AppState<I>>>,
    Json(req): Json<SearchQualityRequest>,
) -> Json<serde_json::Value> {
    state.store.set_search_quality(req.ef);
    Json(serde_json::json!({"ef": req.ef, "status": "updated"}))
}

async fn health<I: AnnIndex + std::fmt::Debug + 'static>(
    State(state): State<Arc<AppState<I>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        vector_count: state.store.len(),
        dimension: state.store.dimension(),
        capacity: state.store.capacity(),
    })
}

async fn get_metrics<I: AnnIndex + std::fmt::Debug + 'static>(
    State(state): State<Arc<AppState<I>>>,
) -> Json<MetricsResponse> {
    let metrics = state.metrics.read();

    Json(MetricsResponse {
        total_searches: metrics.total_searches(),
        total_inserts: metrics.total_inserts(),
        total_batch_items: metrics.total_batch_items(),
        avg_search_latency_us: metrics.avg_search_latency_us(),
        p50_search_latency_us: metrics.percentile_search_latency_us(50.0),
        p95_search_latency_us: metrics.percentile_search_latency_us(95.0),
        p99_search_latency_us: metrics.percentile_search_latency_us(99.0),
    })
}
