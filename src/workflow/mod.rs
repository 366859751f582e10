/// Graph Definition Layer
///
/// This module holds everything a run reads as input:
/// - Type definitions (NodeInstance, Edge, RunRequest, RunSnapshot)
/// - The node type registry with lock-free hot reload
/// - The graph index used by the evaluation scheduler

// Core node/edge/run type definitions
pub mod types;

// Node type registry, hot-reloadable through ArcSwap
pub mod registry;

// Reverse adjacency index, sink detection and reachability
pub mod graph;

// Re-export commonly used types
pub use graph::InputGraph;
pub use registry::{NodeTypeDefinition, RegistryHandle, TypeRegistry};
pub use types::{Edge, NodeInstance, RunOptions, RunRequest, RunSnapshot};
