/// Graph index over the edge list
///
/// The evaluation scheduler walks the graph backwards from its targets, so the
/// primary structure is a reverse adjacency map: target node -> the ordered
/// list of its upstream connections. Edge-declaration order is preserved and
/// is the order in which upstream nodes are visited.

use crate::workflow::types::{Edge, NodeInstance};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use std::collections::{HashMap, HashSet};

/// One inbound connection of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    /// Node producing the value
    pub source: String,
    /// Output slot read from the source's settled value
    pub source_slot: String,
    /// Input slot the value is stored under
    pub target_slot: String,
}

/// Reverse adjacency (and one-hop forward adjacency) built from the edge list
///
/// Dangling references are tolerated here; the scheduler skips ids that have
/// no node.
#[derive(Debug, Default)]
pub struct InputGraph {
    inputs: HashMap<String, Vec<Upstream>>,
    downstream: HashMap<String, Vec<String>>,
}

impl InputGraph {
    /// Index the edges in a single O(E) pass
    pub fn build(edges: &[Edge]) -> Self {
        let mut inputs: HashMap<String, Vec<Upstream>> = HashMap::new();
        let mut downstream: HashMap<String, Vec<String>> = HashMap::new();

        for edge in edges {
            inputs.entry(edge.target.clone()).or_default().push(Upstream {
                source: edge.source.clone(),
                source_slot: edge.source_slot().to_string(),
                target_slot: edge.target_slot().to_string(),
            });

            let targets = downstream.entry(edge.source.clone()).or_default();
            if !targets.contains(&edge.target) {
                targets.push(edge.target.clone());
            }
        }

        Self { inputs, downstream }
    }

    /// Upstream connections of a node, in edge-declaration order
    pub fn inputs(&self, node_id: &str) -> &[Upstream] {
        self.inputs.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct direct successors of a node, in edge-declaration order
    pub fn downstream(&self, node_id: &str) -> &[String] {
        self.downstream.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Nodes without outgoing edges, in node order
pub fn sink_nodes(nodes: &[NodeInstance], edges: &[Edge]) -> Vec<String> {
    let sources: HashSet<&str> = edges.iter().map(|e| e.source.as_str()).collect();
    nodes
        .iter()
        .filter(|n| !sources.contains(n.id.as_str()))
        .map(|n| n.id.clone())
        .collect()
}

/// Every node a backward walk from `targets` can reach (targets included)
///
/// Ids missing from `nodes`, and edges touching them, are ignored.
pub fn reachable_from(nodes: &[NodeInstance], edges: &[Edge], targets: &[String]) -> HashSet<String> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();

    for node in nodes {
        index.entry(node.id.as_str()).or_insert_with(|| graph.add_node(node.id.as_str()));
    }
    for edge in edges {
        if let (Some(&from), Some(&to)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str())) {
            graph.add_edge(from, to, ());
        }
    }

    let reversed = Reversed(&graph);
    let mut reachable = HashSet::new();
    for target in targets {
        let Some(&start) = index.get(target.as_str()) else {
            continue;
        };
        let mut dfs = Dfs::new(reversed, start);
        while let Some(nx) = dfs.next(reversed) {
            reachable.insert(graph[nx].to_string());
        }
    }

    reachable
}
