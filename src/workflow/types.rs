/// Core graph type definitions
///
/// Defines the node, edge and run structures exchanged with the canvas. These
/// types are serialized/deserialized from JSON, and any canvas-only fields
/// (positions, sizes, edge styling) are carried through a run untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Slot name used when an edge does not name its source or target handle
pub const DEFAULT_SLOT: &str = "value";

/// A single node placed on the canvas
///
/// The attribute bag (`data`) holds both configuration parameters set by the
/// user and fields written during execution (current value, streamed text,
/// progress, status).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInstance {
    /// Globally unique node identifier (e.g., "a", "gen-1")
    pub id: String,
    /// Key into the type registry that determines execution behavior
    #[serde(rename = "type")]
    pub node_type: String,
    /// Mutable attribute bag: parameters plus execution-produced fields
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Canvas-owned fields the engine never interprets
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeInstance {
    /// Create a node with an empty attribute bag
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            data: Map::new(),
            extra: Map::new(),
        }
    }

    /// Builder-style attribute setter, mostly used when assembling graphs in code
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Current `value` attribute, if any
    pub fn value(&self) -> Option<&Value> {
        self.data.get("value")
    }
}

/// Connection from an output slot of one node to an input slot of another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Source node ID
    pub source: String,
    /// Output slot on the source node (defaults to "value")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// Target node ID
    pub target: String,
    /// Input slot on the target node (defaults to "value")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    /// Edge display data; `label` is refreshed at the end of every run
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Canvas-owned fields (id, type, styling)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Edge {
    /// Create an edge between two named slots
    pub fn new(
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            source_handle: Some(source_handle.into()),
            target: target.into(),
            target_handle: Some(target_handle.into()),
            data: Map::new(),
            extra: Map::new(),
        }
    }

    /// Output slot name, falling back to the conventional `value` slot
    pub fn source_slot(&self) -> &str {
        self.source_handle.as_deref().unwrap_or(DEFAULT_SLOT)
    }

    /// Input slot name, falling back to the conventional `value` slot
    pub fn target_slot(&self) -> &str {
        self.target_handle.as_deref().unwrap_or(DEFAULT_SLOT)
    }

    /// Display label written by the last run, if any
    pub fn label(&self) -> Option<&str> {
        self.data.get("label").and_then(Value::as_str)
    }
}

/// Per-run visual pacing options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunOptions {
    /// Artificial delay applied to highlighted phases, in milliseconds
    pub pacing_delay_ms: u64,
    /// Pace the traversal (pre-visit/post-visit) phase
    pub highlight_traversal: bool,
    /// Pace the evaluation (start/end) phase
    pub highlight_evaluation: bool,
}

impl RunOptions {
    /// Options with all pacing disabled
    pub fn immediate() -> Self {
        Self {
            pacing_delay_ms: 0,
            highlight_traversal: false,
            highlight_evaluation: false,
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            pacing_delay_ms: 300,
            highlight_traversal: false,
            highlight_evaluation: true,
        }
    }
}

/// Request body for one orchestrator invocation
///
/// An empty `target_ids` list means "run all": every sink node is evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub nodes: Vec<NodeInstance>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub target_ids: Vec<String>,
    /// Falls back to the engine's configured defaults when absent
    #[serde(default)]
    pub options: Option<RunOptions>,
}

impl RunRequest {
    /// Build a request that evaluates the given targets
    pub fn new(nodes: Vec<NodeInstance>, edges: Vec<Edge>, target_ids: Vec<String>) -> Self {
        Self {
            nodes,
            edges,
            target_ids,
            options: None,
        }
    }

    /// Override the pacing options for this run
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Final node/edge snapshot returned by a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Nodes with their attribute bags as left by the run, in input order
    pub nodes: Vec<NodeInstance>,
    /// Edges with refreshed display labels
    pub edges: Vec<Edge>,
    /// Settled value per node (null for failed nodes)
    #[serde(skip)]
    pub settled: BTreeMap<String, Value>,
}

impl RunSnapshot {
    /// Look up a node of the snapshot by ID
    pub fn node(&self, id: &str) -> Option<&NodeInstance> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Map of edge (source, target) pairs to their labels
    pub fn labels(&self) -> HashMap<(String, String), String> {
        self.edges
            .iter()
            .map(|e| {
                (
                    (e.source.clone(), e.target.clone()),
                    e.label().unwrap_or_default().to_string(),
                )
            })
            .collect()
    }
}
