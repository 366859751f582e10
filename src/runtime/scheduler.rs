/// Depth-first evaluation scheduler
///
/// Walks the graph backwards from a target, evaluating every upstream node
/// before the node itself. Each node settles at most once per run; a node
/// reached again while it is still on the recursion stack yields an empty
/// value instead of recursing forever. Everything is sequential: each
/// upstream evaluation and each dispatch is awaited before the next step, so
/// visitation order is fully deterministic.

use crate::runtime::{
    error::NodeError,
    local::LocalExecutor,
    observer::Observer,
    remote::{RemoteContext, RemoteExecutor},
    state::{NodeTable, RunState},
    unwrap::unwrap_slot,
};
use crate::workflow::{graph::InputGraph, registry::TypeRegistry, types::RunOptions};
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

/// Read-only collaborators of one run
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    pub graph: &'a InputGraph,
    pub registry: &'a TypeRegistry,
    pub local: &'a LocalExecutor,
    pub remote: &'a RemoteExecutor,
    pub observer: &'a dyn Observer,
    pub options: &'a RunOptions,
}

/// Recursive evaluator holding the per-run state
pub struct Scheduler<'a> {
    ctx: RunContext<'a>,
    nodes: &'a mut NodeTable,
    state: RunState,
}

impl<'a> Scheduler<'a> {
    pub fn new(ctx: RunContext<'a>, nodes: &'a mut NodeTable) -> Self {
        Self {
            ctx,
            nodes,
            state: RunState::new(),
        }
    }

    /// Evaluate a node and everything upstream of it
    ///
    /// Returns the node's settled value, or `None` when the node is missing,
    /// failed, could not be dispatched, or was cut off as a cycle member.
    pub fn evaluate<'s>(&'s mut self, node_id: &'s str) -> BoxFuture<'s, Option<Value>> {
        async move {
            if !self.nodes.contains(node_id) {
                let error = NodeError::MissingNode(node_id.to_string());
                tracing::warn!("⚠️ {}, skipping its subtree", error);
                self.ctx.observer.node_failed(node_id, &error);
                return None;
            }

            // Cycle guard: a node already on the stack is not re-entered
            if !self.state.enter(node_id) {
                tracing::debug!("🔁 '{}' is already being evaluated, breaking cycle", node_id);
                return None;
            }

            self.highlight_traversal(node_id).await;

            let graph = self.ctx.graph;

            if let Some(cached) = self.state.settled(node_id).cloned() {
                // Walk upstream again so observers see a consistent order, without re-executing
                for upstream in graph.inputs(node_id) {
                    self.evaluate(&upstream.source).await;
                }
                self.state.leave(node_id);
                return Some(cached).filter(|v| !v.is_null());
            }

            for upstream in graph.inputs(node_id) {
                self.evaluate(&upstream.source).await;
            }

            let inputs = self.assemble_inputs(node_id);
            let result = self.dispatch(node_id, inputs).await;

            if let Some(value) = &result {
                self.state.settle(node_id, value.clone());
            }
            self.state.leave(node_id);

            result.filter(|v| !v.is_null())
        }
        .boxed()
    }

    /// Finish the run and hand back its state
    pub fn into_state(self) -> RunState {
        self.state
    }

    /// Number of nodes settled so far
    pub fn settled_count(&self) -> usize {
        self.state.settled_count()
    }

    /// Build the input map from upstream settled values
    ///
    /// Unsettled or failed sources, and sources whose slot holds null, are
    /// left out of the map.
    fn assemble_inputs(&self, node_id: &str) -> Map<String, Value> {
        let mut inputs = Map::new();
        for upstream in self.ctx.graph.inputs(node_id) {
            let unwrapped = self
                .state
                .settled(&upstream.source)
                .map(|value| unwrap_slot(value, &upstream.source_slot))
                .filter(|value| !value.is_null());
            match unwrapped {
                Some(value) => {
                    inputs.insert(upstream.target_slot.clone(), value);
                }
                None => {
                    tracing::debug!(
                        "⏭️ No value from '{}' for slot '{}' of '{}'",
                        upstream.source,
                        upstream.target_slot,
                        node_id
                    );
                }
            }
        }
        inputs
    }

    /// Run the node through the local or remote executor
    ///
    /// Returns `None` when the node cannot be dispatched at all (unknown type);
    /// executor failures settle as null.
    async fn dispatch(&mut self, node_id: &str, inputs: Map<String, Value>) -> Option<Value> {
        let ctx = self.ctx;
        let node_type = self.nodes.get(node_id)?.node_type.clone();

        let Some(def) = ctx.registry.get(&node_type) else {
            let error = NodeError::MissingTypeDefinition {
                node_id: node_id.to_string(),
                node_type,
            };
            tracing::warn!("⚠️ {}", error);
            ctx.observer.node_failed(node_id, &error);
            return None;
        };

        ctx.observer.evaluation_start(node_id);
        if ctx.options.highlight_evaluation {
            self.pace().await;
        }

        let started = Instant::now();
        let outcome = if def.client_only {
            let node = self.nodes.get_mut(node_id)?;
            Ok(ctx.local.evaluate(node, def, &inputs))
        } else {
            let remote_ctx = RemoteContext {
                nodes: &mut *self.nodes,
                graph: ctx.graph,
                observer: ctx.observer,
            };
            ctx.remote
                .evaluate(node_id, inputs, remote_ctx)
                .await
                .map_err(NodeError::from)
        };

        let value = match outcome {
            Ok(value) => {
                tracing::info!("✅ Node '{}' ({}) completed in {:?}", node_id, node_type, started.elapsed());
                value
            }
            Err(error) => {
                tracing::error!("❌ Node '{}' ({}) failed after {:?}: {}", node_id, node_type, started.elapsed(), error);
                ctx.observer.node_failed(node_id, &error);
                Value::Null
            }
        };

        ctx.observer.evaluation_end(node_id, &self.nodes.attributes(node_id));
        Some(value)
    }

    /// Pre-visit/post-visit hooks around the paced traversal highlight
    async fn highlight_traversal(&self, node_id: &str) {
        self.ctx.observer.pre_visit(node_id);
        if self.ctx.options.highlight_traversal {
            self.pace().await;
        }
        self.ctx.observer.post_visit(node_id);
    }

    async fn pace(&self) {
        let delay = self.ctx.options.pacing_delay_ms;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}
