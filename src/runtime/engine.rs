/// Run orchestrator
///
/// Entry point of the dataflow engine. Builds the graph index, evaluates each
/// target in turn through the scheduler, and assembles the final node/edge
/// snapshot with refreshed edge labels. A run never fails as a whole: every
/// problem is contained to the node it happened on.

use crate::runtime::{
    local::LocalExecutor,
    observer::Observer,
    remote::RemoteExecutor,
    scheduler::{RunContext, Scheduler},
    state::NodeTable,
    unwrap::{display_label, unwrap_slot},
};
use crate::workflow::{
    graph::{reachable_from, sink_nodes, InputGraph},
    registry::TypeRegistry,
    types::{Edge, RunOptions, RunRequest, RunSnapshot},
};
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};

/// Dataflow execution engine
///
/// Holds the executors shared by every run. The type registry is passed to
/// each run explicitly so a registry refresh never changes a run midway.
#[derive(Debug)]
pub struct ExecutionEngine {
    /// Strategy map for client-only node types
    local: Arc<LocalExecutor>,
    /// Channel-backed executor for everything else
    remote: RemoteExecutor,
    /// Options used when a request carries none
    default_options: RunOptions,
}

impl ExecutionEngine {
    /// Create a new engine from its executors
    pub fn new(local: Arc<LocalExecutor>, remote: RemoteExecutor) -> Self {
        Self {
            local,
            remote,
            default_options: RunOptions::default(),
        }
    }

    /// Replace the options applied to requests that carry none
    pub fn with_default_options(mut self, options: RunOptions) -> Self {
        self.default_options = options;
        self
    }

    /// The local executor, e.g. for registry validation
    pub fn local(&self) -> &LocalExecutor {
        &self.local
    }

    /// Evaluate the requested targets and return the resulting snapshot
    ///
    /// With no explicit targets every sink node is evaluated. Targets are
    /// processed one after another in the given order, sharing one memo.
    pub async fn run(&self, request: RunRequest, registry: &TypeRegistry, observer: &dyn Observer) -> RunSnapshot {
        let run_start_time = std::time::Instant::now();
        let RunRequest {
            nodes,
            edges,
            target_ids,
            options,
        } = request;
        let options = options.unwrap_or_else(|| self.default_options.clone());

        tracing::info!("🚀 Starting run with {} nodes and {} edges", nodes.len(), edges.len());

        let targets = if target_ids.is_empty() {
            let sinks = sink_nodes(&nodes, &edges);
            tracing::debug!("🎯 No explicit targets, using sink nodes: {:?}", sinks);
            sinks
        } else {
            target_ids
        };

        if targets.is_empty() {
            tracing::warn!("⚠️ No sink nodes found, nothing to evaluate");
            return RunSnapshot {
                nodes,
                edges,
                settled: BTreeMap::new(),
            };
        }

        // Build the reverse adjacency index for the scheduler
        let graph = InputGraph::build(&edges);
        let reachable = reachable_from(&nodes, &edges, &targets);
        tracing::debug!("📊 {} nodes reachable from {} targets", reachable.len(), targets.len());

        let mut table = NodeTable::new(nodes);
        let ctx = RunContext {
            graph: &graph,
            registry,
            local: &self.local,
            remote: &self.remote,
            observer,
            options: &options,
        };
        let mut scheduler = Scheduler::new(ctx, &mut table);

        for (step, target) in targets.iter().enumerate() {
            tracing::info!("📍 Target {}/{}: '{}'", step + 1, targets.len(), target);
            scheduler.evaluate(target).await;
        }

        let settled = scheduler.into_state().into_settled();
        let edges = label_edges(edges, &settled, &table, registry);

        tracing::info!(
            "🎉 Run completed: {} of {} reachable nodes settled in {:?}",
            settled.len(),
            reachable.len(),
            run_start_time.elapsed()
        );

        RunSnapshot {
            nodes: table.into_nodes(),
            edges,
            settled,
        }
    }
}

/// Refresh every edge's display label from its source's settled value
///
/// Sources whose type opts out with `showOutputOnEdge: false`, and sources
/// that never settled, get a blank label.
fn label_edges(edges: Vec<Edge>, settled: &BTreeMap<String, Value>, table: &NodeTable, registry: &TypeRegistry) -> Vec<Edge> {
    edges
        .into_iter()
        .map(|mut edge| {
            let shows_output = table
                .get(&edge.source)
                .and_then(|node| registry.get(&node.node_type))
                .map_or(true, |def| def.show_output_on_edge);

            let label = match settled.get(&edge.source) {
                Some(value) if shows_output => display_label(&unwrap_slot(value, edge.source_slot())),
                _ => String::new(),
            };

            edge.data.insert("label".to_string(), Value::String(label));
            edge
        })
        .collect()
}
