/// Run and registry REST API endpoints
///
/// A run request carries the whole graph; the engine evaluates it against the
/// registry snapshot current at request time and returns the final state.

use crate::{
    runtime::{engine::ExecutionEngine, observer::TracingObserver},
    workflow::{
        registry::{RegistryHandle, TypeRegistry},
        types::{RunRequest, RunSnapshot},
    },
};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Evaluation engine shared by all requests
    pub engine: Arc<ExecutionEngine>,
    /// Hot-reload registry of node types
    pub registry: Arc<RegistryHandle>,
}

/// Response for a registry refresh
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub version: Option<String>,
    pub node_types: usize,
    pub refreshed_at: DateTime<Utc>,
    pub message: String,
}

/// Create run and registry routes
pub fn create_run_routes() -> Router<AppState> {
    Router::new()
        .route("/api/run", post(run_graph))
        .route("/api/registry", get(get_registry))
        .route("/api/registry/refresh", post(refresh_registry))
}

/// Evaluate a graph
///
/// POST /api/run
/// Body: { "nodes": [...], "edges": [...], "targetIds": ["..."], "options": {...} }
/// Returns: { "nodes": [...], "edges": [...] }
async fn run_graph(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Json<RunSnapshot> {
    let registry = state.registry.current();
    Json(state.engine.run(request, &registry, &TracingObserver).await)
}

/// Current node type registry
///
/// GET /api/registry
async fn get_registry(State(state): State<AppState>) -> Json<TypeRegistry> {
    Json(state.registry.current().as_ref().clone())
}

/// Re-fetch the registry from the backend
///
/// POST /api/registry/refresh
async fn refresh_registry(
    State(state): State<AppState>,
) -> Result<Json<RefreshResponse>, StatusCode> {
    match state.registry.refresh(state.engine.local()).await {
        Ok(registry) => Ok(Json(RefreshResponse {
            version: registry.version.clone(),
            node_types: registry.nodes.len(),
            refreshed_at: Utc::now(),
            message: "Registry refreshed successfully".to_string(),
        })),
        Err(e) => {
            tracing::error!("Failed to refresh node registry: {}", e);
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}
