/// Configuration management for the nodeflow engine
///
/// Handles server binding, engine pacing/timeout parameters and backend endpoints.

use crate::workflow::types::RunOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Evaluation engine configuration
    pub engine: EngineConfig,
    /// Backend endpoints for remote node execution
    pub backend: BackendConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Engine defaults applied to runs that carry no options of their own
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Delay used by traversal/evaluation highlighting
    pub pacing_delay_ms: u64,
    pub highlight_traversal: bool,
    pub highlight_evaluation: bool,
    /// Window without progress after which a remote request fails
    pub inactivity_timeout_secs: u64,
    /// Hard limit for a single remote request
    pub absolute_timeout_secs: u64,
}

/// Backend endpoints; `None` disables the corresponding feature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Bidirectional message channel (e.g. "ws://localhost:5001/ws")
    pub ws_url: Option<String>,
    /// Node type registry document (e.g. "http://localhost:5001/node-registry")
    pub registry_url: Option<String>,
}

impl EngineConfig {
    /// Run options derived from the engine defaults
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            pacing_delay_ms: self.pacing_delay_ms,
            highlight_traversal: self.highlight_traversal,
            highlight_evaluation: self.highlight_evaluation,
        }
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn absolute_timeout(&self) -> Duration {
        Duration::from_secs(self.absolute_timeout_secs)
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("NODEFLOW_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_parse("NODEFLOW_PORT", 3005),
            },
            engine: EngineConfig {
                pacing_delay_ms: env_parse("NODEFLOW_PACING_MS", 300),
                highlight_traversal: env_parse("NODEFLOW_HIGHLIGHT_TRAVERSAL", false),
                highlight_evaluation: env_parse("NODEFLOW_HIGHLIGHT_EVALUATION", true),
                inactivity_timeout_secs: env_parse("NODEFLOW_INACTIVITY_SECS", 30),
                absolute_timeout_secs: env_parse("NODEFLOW_ABSOLUTE_SECS", 300),
            },
            backend: BackendConfig {
                ws_url: env_url("NODEFLOW_WS_URL", "ws://localhost:5001/ws"),
                registry_url: env_url("NODEFLOW_REGISTRY_URL", "http://localhost:5001/node-registry"),
            },
        }
    }
}

/// Read and parse an env var, falling back to the default when unset or invalid
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

/// Read an endpoint env var; an explicitly empty value disables the endpoint
fn env_url(key: &str, default: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(url) if url.trim().is_empty() => None,
        Ok(url) => Some(url),
        Err(_) => Some(default.to_string()),
    }
}
