/// Dataflow Evaluation Runtime
///
/// This module provides the engine that turns a node graph into values.
/// It handles:
/// - Depth-first, memoized, cycle-safe traversal from target nodes
/// - Local (in-process) and remote (channel-backed) node execution
/// - Unwrapping structured outputs into the slots that consume them
/// - Reporting every state transition to an observer

// Run orchestrator: entry point producing the final snapshot
pub mod engine;

// Recursive evaluation scheduler
pub mod scheduler;

// Per-run node table, cycle guard and memo
pub mod state;

// In-process computations keyed by node type
pub mod local;

// Correlated request/response execution over the backend channel
pub mod remote;

// Output-to-slot value normalization
pub mod unwrap;

// Observer / UI-sync hooks
pub mod observer;

// Per-node error taxonomy
pub mod error;

// Re-export main types
pub use engine::ExecutionEngine;
pub use error::{NodeError, RemoteError};
pub use local::{LocalComputation, LocalExecutor};
pub use observer::{ChannelObserver, NodeEvent, NoopObserver, Observer, TracingObserver, ViewMirror};
pub use remote::RemoteExecutor;
