/// nodeflow: dataflow evaluation engine for node-graph canvases
///
/// This library evaluates a directed graph of nodes on demand, pulling values from
/// upstream nodes, running each node either in-process or on a remote backend over
/// a message channel, and reporting every state transition to an observer.

// Core configuration and setup
pub mod config;

// Graph model layer - node instances, edges, type registry and graph indexing
pub mod workflow;

// Runtime execution engine - scheduler, executors and observer hooks
pub mod runtime;

// Backend message channels (WebSocket and in-memory)
pub mod transport;

// HTTP API layer - run and registry endpoints
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use runtime::{ExecutionEngine, NodeError, Observer, RemoteError};
pub use server::start_server;
pub use workflow::{Edge, NodeInstance, RunOptions, RunRequest, RunSnapshot, TypeRegistry};
