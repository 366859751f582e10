/// Per-run mutable state
///
/// `NodeTable` owns the attribute bags of every node for the duration of one
/// run. `RunState` holds the cycle guard and the memo of settled values. Both
/// are discarded (or handed back as a snapshot) when the run ends.

use crate::workflow::types::NodeInstance;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Conventional output field read by downstream nodes and edge labels
pub const VALUE_FIELD: &str = "value";
/// Accumulated streamed text of a remote node
pub const STREAM_FIELD: &str = "streamText";
/// Progress percentage of an outstanding remote request
pub const PROGRESS_FIELD: &str = "progress";
/// Status message of an outstanding remote request
pub const STATUS_FIELD: &str = "status";

/// Nodes of one run, addressable by ID, in their original order
#[derive(Debug, Default)]
pub struct NodeTable {
    nodes: Vec<NodeInstance>,
    index: HashMap<String, usize>,
}

impl NodeTable {
    /// Index the nodes; on duplicate IDs the first occurrence wins
    pub fn new(nodes: Vec<NodeInstance>) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        for (position, node) in nodes.iter().enumerate() {
            if index.contains_key(&node.id) {
                tracing::warn!("⚠️ Duplicate node id '{}' ignored for evaluation", node.id);
                continue;
            }
            index.insert(node.id.clone(), position);
        }
        Self { nodes, index }
    }

    pub fn get(&self, node_id: &str) -> Option<&NodeInstance> {
        self.index.get(node_id).map(|&i| &self.nodes[i])
    }

    pub fn get_mut(&mut self, node_id: &str) -> Option<&mut NodeInstance> {
        self.index.get(node_id).map(|&i| &mut self.nodes[i])
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.index.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Attribute bag of a node (empty for unknown IDs)
    pub fn attributes(&self, node_id: &str) -> Map<String, Value> {
        self.get(node_id).map(|n| n.data.clone()).unwrap_or_default()
    }

    /// Set or (with null) remove fields of a node, returning the applied patch
    pub fn patch(&mut self, node_id: &str, fields: Map<String, Value>) -> Option<Map<String, Value>> {
        let node = self.get_mut(node_id)?;
        for (key, value) in &fields {
            if value.is_null() {
                node.data.remove(key);
            } else {
                node.data.insert(key.clone(), value.clone());
            }
        }
        Some(fields)
    }

    /// Store every field of a record as-is, nulls included
    pub fn merge(&mut self, node_id: &str, record: &Map<String, Value>) -> bool {
        let Some(node) = self.get_mut(node_id) else {
            return false;
        };
        for (key, value) in record {
            node.data.insert(key.clone(), value.clone());
        }
        true
    }

    /// Append text to a string field, starting it fresh when it holds anything else
    ///
    /// Returns the field's new content.
    pub fn append_text(&mut self, node_id: &str, field: &str, increment: &str) -> Option<String> {
        let node = self.get_mut(node_id)?;
        let updated = match node.data.get(field) {
            Some(Value::String(existing)) => format!("{existing}{increment}"),
            _ => increment.to_string(),
        };
        node.data.insert(field.to_string(), Value::String(updated.clone()));
        Some(updated)
    }

    /// Hand the nodes back in their original order
    pub fn into_nodes(self) -> Vec<NodeInstance> {
        self.nodes
    }
}

/// Cycle guard and memo for one orchestrator invocation
#[derive(Debug, Default)]
pub struct RunState {
    /// Nodes on the active recursion stack
    visiting: HashSet<String>,
    /// Final value per node; null marks a failed node
    settled: HashMap<String, Value>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a node on the stack; false when it is already there (a cycle)
    pub fn enter(&mut self, node_id: &str) -> bool {
        self.visiting.insert(node_id.to_string())
    }

    /// Take a node off the stack
    pub fn leave(&mut self, node_id: &str) {
        self.visiting.remove(node_id);
    }

    pub fn is_visiting(&self, node_id: &str) -> bool {
        self.visiting.contains(node_id)
    }

    /// Record a node's final value; a node settles at most once
    pub fn settle(&mut self, node_id: &str, value: Value) {
        if self.settled.contains_key(node_id) {
            tracing::warn!("⚠️ Node '{}' already settled, keeping first value", node_id);
            return;
        }
        self.settled.insert(node_id.to_string(), value);
    }

    pub fn settled(&self, node_id: &str) -> Option<&Value> {
        self.settled.get(node_id)
    }

    pub fn settled_count(&self) -> usize {
        self.settled.len()
    }

    /// Settled values, ordered by node ID
    pub fn into_settled(self) -> BTreeMap<String, Value> {
        self.settled.into_iter().collect()
    }
}
