/// Observer / UI-sync interface
///
/// The engine reports its progress through these hooks so a live view can
/// mirror node state without the engine knowing anything about rendering.
/// Hook calls happen on the run's own task, in the exact order the scheduler
/// performs the corresponding steps.

use crate::runtime::error::NodeError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Receiver of engine state transitions
///
/// All hooks default to no-ops.
pub trait Observer: Send + Sync {
    /// Traversal reached a node
    fn pre_visit(&self, _node_id: &str) {}

    /// Traversal highlight of a node ended
    fn post_visit(&self, _node_id: &str) {}

    /// Node is about to be computed
    fn evaluation_start(&self, _node_id: &str) {}

    /// Node finished (successfully or not); `attributes` is the authoritative bag
    fn evaluation_end(&self, _node_id: &str, _attributes: &Map<String, Value>) {}

    /// Side-channel write (progress, streamed text) to some fields of a node
    fn attributes_patched(&self, _node_id: &str, _patch: &Map<String, Value>) {}

    /// Node failed; the run continues
    fn node_failed(&self, _node_id: &str, _error: &NodeError) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Observer that records every hook as a tracing event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn pre_visit(&self, node_id: &str) {
        tracing::debug!("👣 Visiting '{}'", node_id);
    }

    fn evaluation_start(&self, node_id: &str) {
        tracing::debug!("⚙️ Evaluating '{}'", node_id);
    }

    fn evaluation_end(&self, node_id: &str, attributes: &Map<String, Value>) {
        let value = attributes.get("value").unwrap_or(&Value::Null);
        tracing::debug!("📤 '{}' value: {}", node_id, value);
    }

    fn attributes_patched(&self, node_id: &str, patch: &Map<String, Value>) {
        tracing::trace!("🩹 Patch for '{}': {:?}", node_id, patch);
    }

    fn node_failed(&self, node_id: &str, error: &NodeError) {
        tracing::warn!("⚠️ Node '{}' failed: {}", node_id, error);
    }
}

/// One observer hook call, as a message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum NodeEvent {
    PreVisit { node_id: String },
    PostVisit { node_id: String },
    EvaluationStart { node_id: String },
    EvaluationEnd { node_id: String, attributes: Map<String, Value> },
    Patch { node_id: String, patch: Map<String, Value> },
    Failed { node_id: String, error: String },
}

impl NodeEvent {
    /// Node the event is about
    pub fn node_id(&self) -> &str {
        match self {
            Self::PreVisit { node_id }
            | Self::PostVisit { node_id }
            | Self::EvaluationStart { node_id }
            | Self::EvaluationEnd { node_id, .. }
            | Self::Patch { node_id, .. }
            | Self::Failed { node_id, .. } => node_id,
        }
    }
}

/// Observer that forwards events over an explicit update channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<NodeEvent>,
}

impl ChannelObserver {
    /// Create the observer and the receiving end of its update channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NodeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: NodeEvent) {
        // A dropped receiver means nobody is watching; the run goes on
        let _ = self.tx.send(event);
    }
}

impl Observer for ChannelObserver {
    fn pre_visit(&self, node_id: &str) {
        self.emit(NodeEvent::PreVisit { node_id: node_id.to_string() });
    }

    fn post_visit(&self, node_id: &str) {
        self.emit(NodeEvent::PostVisit { node_id: node_id.to_string() });
    }

    fn evaluation_start(&self, node_id: &str) {
        self.emit(NodeEvent::EvaluationStart { node_id: node_id.to_string() });
    }

    fn evaluation_end(&self, node_id: &str, attributes: &Map<String, Value>) {
        self.emit(NodeEvent::EvaluationEnd {
            node_id: node_id.to_string(),
            attributes: attributes.clone(),
        });
    }

    fn attributes_patched(&self, node_id: &str, patch: &Map<String, Value>) {
        self.emit(NodeEvent::Patch {
            node_id: node_id.to_string(),
            patch: patch.clone(),
        });
    }

    fn node_failed(&self, node_id: &str, error: &NodeError) {
        self.emit(NodeEvent::Failed {
            node_id: node_id.to_string(),
            error: error.to_string(),
        });
    }
}

/// Live-view mirror of node state built from events
///
/// Every event merges into the node's fields rather than replacing them, so
/// fields the view set on its own survive an engine update. Highlight flags
/// (`traversing`, `evaluating`) are tracked the way a canvas would show them.
#[derive(Debug, Default, Clone)]
pub struct ViewMirror {
    nodes: HashMap<String, Map<String, Value>>,
}

impl ViewMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a node's fields, as the view already holds them
    pub fn seed(&mut self, node_id: &str, fields: Map<String, Value>) {
        self.nodes.insert(node_id.to_string(), fields);
    }

    /// Fold one event into the mirror
    pub fn apply(&mut self, event: &NodeEvent) {
        let fields = self.nodes.entry(event.node_id().to_string()).or_default();
        match event {
            NodeEvent::PreVisit { .. } => {
                fields.insert("traversing".into(), Value::Bool(true));
            }
            NodeEvent::PostVisit { .. } => {
                fields.insert("traversing".into(), Value::Bool(false));
            }
            NodeEvent::EvaluationStart { .. } => {
                fields.insert("evaluating".into(), Value::Bool(true));
            }
            NodeEvent::EvaluationEnd { attributes, .. } => {
                merge_into(fields, attributes);
                fields.insert("evaluating".into(), Value::Bool(false));
            }
            NodeEvent::Patch { patch, .. } => merge_into(fields, patch),
            NodeEvent::Failed { error, .. } => {
                fields.insert("error".into(), Value::String(error.clone()));
            }
        }
    }

    /// Current mirrored fields of a node
    pub fn get(&self, node_id: &str) -> Option<&Map<String, Value>> {
        self.nodes.get(node_id)
    }
}

/// Merge `patch` into `fields`; null patch values remove the field
pub fn merge_into(fields: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        if value.is_null() {
            fields.remove(key);
        } else {
            fields.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn channel_observer_forwards_in_order() {
        let (observer, mut rx) = ChannelObserver::channel();
        observer.pre_visit("a");
        observer.evaluation_start("a");
        observer.evaluation_end("a", &map(json!({ "value": 1 })));

        assert_eq!(rx.recv().await, Some(NodeEvent::PreVisit { node_id: "a".into() }));
        assert_eq!(rx.recv().await, Some(NodeEvent::EvaluationStart { node_id: "a".into() }));
        assert!(matches!(rx.recv().await, Some(NodeEvent::EvaluationEnd { .. })));
    }

    #[test]
    fn mirror_merges_instead_of_replacing() {
        let mut mirror = ViewMirror::new();
        mirror.seed("t", map(json!({ "label": "mine", "value": "" })));

        mirror.apply(&NodeEvent::Patch {
            node_id: "t".into(),
            patch: map(json!({ "value": "hel" })),
        });
        mirror.apply(&NodeEvent::EvaluationEnd {
            node_id: "t".into(),
            attributes: map(json!({ "value": "hello", "progress": null })),
        });

        let fields = mirror.get("t").unwrap();
        assert_eq!(fields.get("label"), Some(&json!("mine")));
        assert_eq!(fields.get("value"), Some(&json!("hello")));
        assert_eq!(fields.get("evaluating"), Some(&json!(false)));
        assert!(!fields.contains_key("progress"));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = NodeEvent::Failed {
            node_id: "n".into(),
            error: "boom".into(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "failed", "nodeId": "n", "error": "boom" })
        );

        let end = NodeEvent::EvaluationEnd {
            node_id: "n".into(),
            attributes: map(json!({ "value": 1 })),
        };
        assert_eq!(
            serde_json::to_value(&end).unwrap(),
            json!({ "type": "evaluation-end", "nodeId": "n", "attributes": { "value": 1 } })
        );
    }

    #[test]
    fn tracing_observer_logs_every_hook() {
        let observer = TracingObserver;
        observer.pre_visit("n");
        observer.evaluation_start("n");
        observer.evaluation_end("n", &map(json!({ "value": 1 })));
        observer.evaluation_end("n", &Map::new());
        observer.attributes_patched("n", &map(json!({ "progress": 10 })));
        observer.node_failed("n", &NodeError::MissingNode("n".into()));
    }
}
