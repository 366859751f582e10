/// nodeflow: dataflow evaluation engine for node-graph canvases
///
/// Main entry point for the nodeflow server. Initializes configuration and starts
/// the HTTP server with graph run and registry endpoints.

use nodeflow::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Graph evaluation at POST /api/run
/// - Node registry at /api/registry and /api/registry/refresh
/// - Health check at /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (defaults to 0.0.0.0:3005 and a backend on localhost:5001)
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
