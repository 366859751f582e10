/// Remote node execution over the backend channel
///
/// A remote evaluation is one correlated request on a shared, unordered
/// message channel:
/// - send `evaluate-node` with a fresh request id
/// - `node-progress` resets the inactivity timer and publishes progress/status
/// - `node-stream` appends text to the node's own accumulator and pushes the
///   same increment onto the `value` of every direct downstream node
/// - `node-result` / `node-error` settle the request
///
/// Two independent timeouts apply: an inactivity window (reset by progress)
/// and an absolute ceiling. Whatever the outcome, the subscription is dropped
/// and the node's progress/status fields are cleared.

use crate::runtime::{
    error::RemoteError,
    observer::Observer,
    state::{NodeTable, PROGRESS_FIELD, STATUS_FIELD, STREAM_FIELD, VALUE_FIELD},
    unwrap::representative,
};
use crate::transport::Channel;
use crate::workflow::graph::InputGraph;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, sync::Arc, time::Duration};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{timeout_at, Instant};
use uuid::Uuid;

/// Default inactivity window between progress heartbeats
pub const DEFAULT_INACTIVITY_WINDOW: Duration = Duration::from_secs(30);
/// Default ceiling for one remote evaluation
pub const DEFAULT_ABSOLUTE_LIMIT: Duration = Duration::from_secs(300);

/// Messages sent to the backend
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundMessage {
    #[serde(rename_all = "camelCase")]
    EvaluateNode {
        request_id: String,
        node_type: String,
        node_id: String,
        inputs: Map<String, Value>,
        params: Map<String, Value>,
    },
}

/// Messages received from the backend
///
/// Legacy producers omit `requestId` and address responses by `nodeId` only.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundMessage {
    #[serde(rename_all = "camelCase")]
    NodeProgress {
        request_id: Option<String>,
        node_id: Option<String>,
        #[serde(default)]
        progress: Value,
        #[serde(default)]
        message: Value,
    },
    #[serde(rename_all = "camelCase")]
    NodeStream {
        request_id: Option<String>,
        node_id: Option<String>,
        #[serde(default)]
        data: Value,
    },
    #[serde(rename_all = "camelCase")]
    NodeResult {
        request_id: Option<String>,
        node_id: Option<String>,
        #[serde(default)]
        result: Value,
        error: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    NodeError {
        request_id: Option<String>,
        node_id: Option<String>,
        #[serde(default)]
        error: Value,
    },
    #[serde(rename = "transport-closed")]
    TransportClosed,
    #[serde(other)]
    Other,
}

/// The request currently outstanding for one node
#[derive(Debug, Clone)]
struct PendingRequest {
    request_id: String,
    node_id: String,
}

impl PendingRequest {
    /// Correlation check: request id when present, node id otherwise
    fn owns(&self, request_id: Option<&str>, node_id: Option<&str>) -> bool {
        match request_id {
            Some(id) => id == self.request_id,
            None => node_id == Some(self.node_id.as_str()),
        }
    }
}

/// Everything a remote evaluation needs from the run
pub struct RemoteContext<'a> {
    pub nodes: &'a mut NodeTable,
    pub graph: &'a InputGraph,
    pub observer: &'a dyn Observer,
}

/// Executor for node types that run on the backend
#[derive(Clone)]
pub struct RemoteExecutor {
    /// Backend channel; `None` behaves like a channel that is not open
    channel: Option<Arc<dyn Channel>>,
    inactivity_window: Duration,
    absolute_limit: Duration,
}

impl fmt::Debug for RemoteExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteExecutor")
            .field("connected", &self.channel.as_ref().is_some_and(|c| c.is_open()))
            .field("inactivity_window", &self.inactivity_window)
            .field("absolute_limit", &self.absolute_limit)
            .finish()
    }
}

impl RemoteExecutor {
    /// Create an executor over an optional channel with default timeouts
    pub fn new(channel: Option<Arc<dyn Channel>>) -> Self {
        Self {
            channel,
            inactivity_window: DEFAULT_INACTIVITY_WINDOW,
            absolute_limit: DEFAULT_ABSOLUTE_LIMIT,
        }
    }

    /// Executor without a backend; every remote node fails as not connected
    pub fn disconnected() -> Self {
        Self::new(None)
    }

    /// Override both timeout policies
    pub fn with_timeouts(mut self, inactivity_window: Duration, absolute_limit: Duration) -> Self {
        self.inactivity_window = inactivity_window;
        self.absolute_limit = absolute_limit;
        self
    }

    /// Evaluate one node remotely
    ///
    /// On success the normalized payload has been merged into the node's
    /// attribute bag and is returned as the node's settled value. A null
    /// payload settles the node as null and leaves its attributes alone.
    pub async fn evaluate(
        &self,
        node_id: &str,
        inputs: Map<String, Value>,
        ctx: RemoteContext<'_>,
    ) -> Result<Value, RemoteError> {
        let channel = match &self.channel {
            Some(channel) if channel.is_open() => channel,
            _ => return Err(RemoteError::NotConnected),
        };
        let node = ctx
            .nodes
            .get(node_id)
            .ok_or_else(|| RemoteError::Send(format!("node '{}' is not in the run", node_id)))?;

        let pending = PendingRequest {
            request_id: Uuid::new_v4().to_string(),
            node_id: node_id.to_string(),
        };
        let request = OutboundMessage::EvaluateNode {
            request_id: pending.request_id.clone(),
            node_type: node.node_type.clone(),
            node_id: node_id.to_string(),
            inputs,
            params: node.data.clone(),
        };
        let request = serde_json::to_value(&request).map_err(|e| RemoteError::Send(e.to_string()))?;

        // Fresh accumulator for this request
        publish(ctx.nodes, ctx.observer, node_id, [(STREAM_FIELD, Value::String(String::new()))]);

        // Subscribe before sending so no response can slip past
        let mut events = channel.subscribe();
        channel.send(request).map_err(|e| RemoteError::Send(e.to_string()))?;
        tracing::info!("🌐 Sent remote evaluation for '{}' (request {})", node_id, pending.request_id);

        let outcome = self.await_outcome(&pending, &mut events, ctx.nodes, ctx.graph, ctx.observer).await;
        drop(events);

        publish(ctx.nodes, ctx.observer, node_id, [(PROGRESS_FIELD, Value::Null), (STATUS_FIELD, Value::Null)]);

        let payload = outcome?;
        if payload.is_null() {
            tracing::debug!("🕳️ Remote node '{}' returned an empty result", node_id);
            return Ok(Value::Null);
        }

        let record = normalize_result(payload);
        ctx.nodes.merge(node_id, &record);
        Ok(Value::Object(record))
    }

    /// Consume channel events until this request settles or times out
    async fn await_outcome(
        &self,
        pending: &PendingRequest,
        events: &mut broadcast::Receiver<Value>,
        nodes: &mut NodeTable,
        graph: &InputGraph,
        observer: &dyn Observer,
    ) -> Result<Value, RemoteError> {
        let started = Instant::now();
        let deadline = started + self.absolute_limit;
        let mut idle_deadline = started + self.inactivity_window;

        loop {
            let wake = idle_deadline.min(deadline);
            let received = match timeout_at(wake, events.recv()).await {
                Ok(received) => received,
                Err(_) if deadline <= idle_deadline => {
                    return Err(RemoteError::AbsoluteTimeout {
                        node_id: pending.node_id.clone(),
                        limit: self.absolute_limit,
                    });
                }
                Err(_) => {
                    return Err(RemoteError::InactivityTimeout {
                        node_id: pending.node_id.clone(),
                        window: self.inactivity_window,
                    });
                }
            };

            let raw = match received {
                Ok(raw) => raw,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("⚠️ Dropped {} channel messages while waiting on '{}'", skipped, pending.node_id);
                    continue;
                }
                Err(RecvError::Closed) => return Err(RemoteError::ChannelClosed),
            };

            let message = match serde_json::from_value::<InboundMessage>(raw) {
                Ok(message) => message,
                Err(e) => {
                    tracing::debug!("🔇 Ignoring unrecognized channel message: {}", e);
                    continue;
                }
            };

            match message {
                InboundMessage::NodeProgress { request_id, node_id, progress, message }
                    if pending.owns(request_id.as_deref(), node_id.as_deref()) =>
                {
                    idle_deadline = Instant::now() + self.inactivity_window;
                    let progress = progress_value(progress);
                    let status = status_value(message);
                    tracing::debug!("⏳ '{}' progress {} {}", pending.node_id, progress, status);
                    publish(nodes, observer, &pending.node_id, [(PROGRESS_FIELD, progress), (STATUS_FIELD, status)]);
                }
                InboundMessage::NodeStream { request_id, node_id, data }
                    if pending.owns(request_id.as_deref(), node_id.as_deref()) =>
                {
                    push_stream(&pending.node_id, &data, nodes, graph, observer);
                }
                InboundMessage::NodeResult { request_id, node_id, result, error }
                    if pending.owns(request_id.as_deref(), node_id.as_deref()) =>
                {
                    return match error {
                        Some(error) if !error.is_null() => Err(RemoteError::Remote(error_text(&error))),
                        _ => Ok(result),
                    };
                }
                InboundMessage::NodeError { request_id, node_id, error }
                    if pending.owns(request_id.as_deref(), node_id.as_deref()) =>
                {
                    return Err(RemoteError::Remote(error_text(&error)));
                }
                InboundMessage::TransportClosed => return Err(RemoteError::ChannelClosed),
                _ => {}
            }
        }
    }
}

/// Apply a side-channel stream increment
///
/// The increment lands on the node's own accumulator and, one hop out, on the
/// `value` of each direct downstream node. These writes bypass the settle/memo
/// path entirely.
fn push_stream(node_id: &str, data: &Value, nodes: &mut NodeTable, graph: &InputGraph, observer: &dyn Observer) {
    let increment = match data {
        Value::Null => return,
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };

    if let Some(full) = nodes.append_text(node_id, STREAM_FIELD, &increment) {
        observer.attributes_patched(node_id, &single(STREAM_FIELD, Value::String(full)));
    }

    for target in graph.downstream(node_id) {
        if let Some(full) = nodes.append_text(target, VALUE_FIELD, &increment) {
            observer.attributes_patched(target, &single(VALUE_FIELD, Value::String(full)));
        }
    }
}

/// Write fields onto a node and tell the observer
fn publish<const N: usize>(nodes: &mut NodeTable, observer: &dyn Observer, node_id: &str, fields: [(&str, Value); N]) {
    let patch: Map<String, Value> = fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    if let Some(applied) = nodes.patch(node_id, patch) {
        observer.attributes_patched(node_id, &applied);
    }
}

fn single(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

/// Progress as a number, parsing numeric strings
fn progress_value(raw: Value) -> Value {
    match raw {
        Value::String(text) => match text.trim().parse::<f64>() {
            Ok(number) => Value::from(number),
            Err(_) => Value::String(text),
        },
        Value::Number(number) => number.as_f64().map(Value::from).unwrap_or(Value::Number(number)),
        other => other,
    }
}

/// Status line text; non-string messages are shown as JSON
fn status_value(raw: Value) -> Value {
    match raw {
        Value::Null | Value::String(_) => raw,
        other => Value::String(other.to_string()),
    }
}

fn error_text(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        Value::Null => "unknown remote error".to_string(),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}

/// Shape a result payload into a structured record
///
/// Scalars become `{ value: payload }`. Records without a `value` field get
/// one copied from their representative field so downstream unwrapping sees
/// the same convention whichever node produced the record.
pub fn normalize_result(payload: Value) -> Map<String, Value> {
    let mut record = match payload {
        Value::Object(record) => record,
        scalar => return single(VALUE_FIELD, scalar),
    };

    if !record.contains_key(VALUE_FIELD) {
        if let Some(representative) = representative(&record).cloned() {
            record.insert(VALUE_FIELD.to_string(), representative);
        }
    }
    record
}
