/// HTTP API Layer
///
/// This module provides the REST API endpoints around the evaluation engine.
/// It handles:
/// - Graph run requests
/// - Node type registry inspection and refresh

// Run and registry endpoints
pub mod runs;

// Re-export router builder and shared state
pub use runs::{create_run_routes, AppState};
