/// Server setup and initialization
///
/// Wires together all components: backend channel, node registry, execution engine,
/// and HTTP routes. Provides the main application factory function for creating the Axum app.

use crate::{
    api::{create_run_routes, AppState},
    config::Config,
    runtime::{engine::ExecutionEngine, local::LocalExecutor, remote::RemoteExecutor},
    transport::{Channel, WebSocketChannel},
    workflow::registry::{RegistryHandle, TypeRegistry},
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Create the main Axum application with all routes
///
/// Connects to the backend (when configured), loads the node registry and builds
/// the execution engine. A missing backend is not fatal: remote nodes then fail
/// individually as not connected, and only built-in node types are known.
pub async fn create_app(config: Config) -> Result<Router> {
    // Open the backend channel for remote node execution
    let channel: Option<Arc<dyn Channel>> = match config.backend.ws_url.as_deref() {
        Some(url) => {
            tracing::info!("🔌 Connecting to backend channel at {}", url);
            match WebSocketChannel::connect(url).await {
                Ok(channel) => Some(Arc::new(channel)),
                Err(e) => {
                    tracing::warn!("⚠️ Backend channel unavailable, remote nodes will fail: {}", e);
                    None
                }
            }
        }
        None => {
            tracing::info!("🔌 No backend channel configured, running local nodes only");
            None
        }
    };

    // Initialize the execution engine
    tracing::info!("⚙️ Initializing local executor with built-in computations");
    let local = Arc::new(LocalExecutor::with_builtins());
    let remote = RemoteExecutor::new(channel)
        .with_timeouts(config.engine.inactivity_timeout(), config.engine.absolute_timeout());

    tracing::info!("🚀 Initializing execution engine");
    let engine = Arc::new(
        ExecutionEngine::new(Arc::clone(&local), remote).with_default_options(config.engine.run_options()),
    );

    // Load node type registry, built-in types first
    tracing::info!("📊 Loading node type registry");
    let mut registry = TypeRegistry::builtin();
    if let Some(url) = config.backend.registry_url.as_deref() {
        registry = registry.merged_with(TypeRegistry::load_or_empty(url).await);
    }
    for node_type in registry.validate(&local) {
        tracing::warn!("⚠️ Client-only type '{}' has no local computation", node_type);
    }
    tracing::info!("📥 Registry ready with {} node types", registry.nodes.len());
    let registry = Arc::new(RegistryHandle::new(registry, config.backend.registry_url.clone()));

    let app_state = AppState { engine, registry };

    // Create the main application router
    tracing::info!("📡 Creating HTTP router with all endpoints");
    let app = Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        .merge(create_run_routes().with_state(app_state));

    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// Start the HTTP server with the given configuration
///
/// Creates the application and starts the Axum server on the configured address and port.
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting nodeflow server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
