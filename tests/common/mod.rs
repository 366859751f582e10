//! Common test utilities: graph builders, a scripted backend and event capture.
use nodeflow::{
    runtime::{ChannelObserver, ExecutionEngine, LocalExecutor, NodeEvent, RemoteExecutor},
    transport::{Channel, MemoryChannel, MemoryPeer},
    Edge, NodeInstance, RunOptions, RunRequest, RunSnapshot, TypeRegistry,
};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinHandle};

/// Built-in types plus two backend types: a streaming `llm` and a plain `echo`.
#[allow(dead_code)]
pub fn test_registry() -> TypeRegistry {
    let remote = TypeRegistry::from_json(json!({
        "version": "1.0.0",
        "nodes": {
            "llm": {
                "clientOnly": false,
                "inputs": ["prompt"],
                "outputs": ["response", "tokens"],
                "params": { "model": { "default": "small", "ui": "select" } },
                "isStreaming": true
            },
            "echo": {
                "clientOnly": false,
                "inputs": ["value"],
                "outputs": ["value"]
            }
        }
    }))
    .unwrap();
    TypeRegistry::builtin().merged_with(remote)
}

/// Engine without a backend channel.
#[allow(dead_code)]
pub fn local_engine() -> ExecutionEngine {
    ExecutionEngine::new(Arc::new(LocalExecutor::with_builtins()), RemoteExecutor::disconnected())
        .with_default_options(RunOptions::immediate())
}

/// Engine wired to an in-memory channel, plus the backend end of that channel.
#[allow(dead_code)]
pub fn remote_engine(inactivity: Duration, absolute: Duration) -> (ExecutionEngine, MemoryPeer) {
    let (channel, peer) = MemoryChannel::pair();
    let channel: Arc<dyn Channel> = Arc::new(channel);
    let remote = RemoteExecutor::new(Some(channel)).with_timeouts(inactivity, absolute);
    let engine = ExecutionEngine::new(Arc::new(LocalExecutor::with_builtins()), remote)
        .with_default_options(RunOptions::immediate());
    (engine, peer)
}

/// Play the backend: for each request, emit the scripted messages in order,
/// waiting the given delay before each one.
#[allow(dead_code)]
pub fn spawn_backend<F>(mut peer: MemoryPeer, mut script: F) -> JoinHandle<Vec<Value>>
where
    F: FnMut(&Value) -> Vec<(Duration, Value)> + Send + 'static,
{
    tokio::spawn(async move {
        let mut received = Vec::new();
        while let Some(request) = peer.next_request().await {
            for (delay, message) in script(&request) {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                peer.emit(message);
            }
            received.push(request);
        }
        received
    })
}

/// Request id of an outbound `evaluate-node` message.
#[allow(dead_code)]
pub fn request_id(request: &Value) -> String {
    request["requestId"].as_str().unwrap_or_default().to_string()
}

/// Run a request with a recording observer and return the snapshot and every event.
#[allow(dead_code)]
pub async fn run_recorded(
    engine: &ExecutionEngine,
    registry: &TypeRegistry,
    request: RunRequest,
) -> (RunSnapshot, Vec<NodeEvent>) {
    let (observer, rx) = ChannelObserver::channel();
    let snapshot = engine.run(request, registry, &observer).await;
    (snapshot, drain(rx))
}

/// Collect every event already queued on an observer channel.
#[allow(dead_code)]
pub fn drain(mut rx: mpsc::UnboundedReceiver<NodeEvent>) -> Vec<NodeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Node ids of every `evaluation-start` event, in order.
#[allow(dead_code)]
pub fn evaluation_order(events: &[NodeEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            NodeEvent::EvaluationStart { node_id } => Some(node_id.clone()),
            _ => None,
        })
        .collect()
}

/// Error messages reported for a node.
#[allow(dead_code)]
pub fn failures(events: &[NodeEvent], node: &str) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            NodeEvent::Failed { node_id, error } if node_id == node => Some(error.clone()),
            _ => None,
        })
        .collect()
}

/// Position of the first event matching the predicate.
#[allow(dead_code)]
pub fn position(events: &[NodeEvent], predicate: impl Fn(&NodeEvent) -> bool) -> Option<usize> {
    events.iter().position(predicate)
}

/// `number(2)` feeding two `sum` nodes that feed a final `sum`.
///
/// ```text
///     a
///    / \
///   b   c
///    \ /
///     d
/// ```
#[allow(dead_code)]
pub fn diamond() -> (Vec<NodeInstance>, Vec<Edge>) {
    let nodes = vec![
        NodeInstance::new("a", "number").with("value", json!(2)),
        NodeInstance::new("b", "sum"),
        NodeInstance::new("c", "sum"),
        NodeInstance::new("d", "sum"),
    ];
    let edges = vec![
        Edge::new("a", "value", "b", "x"),
        Edge::new("a", "value", "c", "x"),
        Edge::new("b", "value", "d", "x"),
        Edge::new("c", "value", "d", "y"),
    ];
    (nodes, edges)
}

/// `textInput -> llm -> textOutput`
#[allow(dead_code)]
pub fn prompt_chain(prompt: &str) -> (Vec<NodeInstance>, Vec<Edge>) {
    let nodes = vec![
        NodeInstance::new("t", "textInput").with("text", json!(prompt)),
        NodeInstance::new("l", "llm"),
        NodeInstance::new("o", "textOutput"),
    ];
    let edges = vec![
        Edge::new("t", "value", "l", "prompt"),
        Edge::new("l", "response", "o", "value"),
    ];
    (nodes, edges)
}

/// Zero-delay script step.
#[allow(dead_code)]
pub fn now(message: Value) -> (Duration, Value) {
    (Duration::ZERO, message)
}

/// Delayed script step.
#[allow(dead_code)]
pub fn after(secs: u64, message: Value) -> (Duration, Value) {
    (Duration::from_secs(secs), message)
}
