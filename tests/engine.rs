//! Engine behavior with local node types only.
mod common;

use common::*;
use nodeflow::{
    runtime::{NodeEvent, ViewMirror},
    workflow::graph::reachable_from,
    Edge, NodeInstance, RunOptions, RunRequest,
};
use serde_json::{json, Value};

#[tokio::test]
async fn diamond_evaluates_shared_upstream_once() {
    let (nodes, edges) = diamond();
    let engine = local_engine();
    let registry = test_registry();

    let request = RunRequest::new(nodes, edges, vec!["d".into()]);
    let (snapshot, events) = run_recorded(&engine, &registry, request).await;

    assert_eq!(evaluation_order(&events), vec!["a", "b", "c", "d"]);
    assert_eq!(snapshot.settled.get("d"), Some(&json!(4)));
    assert_eq!(snapshot.node("d").unwrap().value(), Some(&json!(4)));

    // The second path through `a` is walked (pre-visit) but not re-executed
    let a_visits = events
        .iter()
        .filter(|e| matches!(e, NodeEvent::PreVisit { node_id } if node_id == "a"))
        .count();
    assert_eq!(a_visits, 2);
}

#[tokio::test]
async fn inputs_are_visited_in_edge_declaration_order() {
    let nodes = vec![
        NodeInstance::new("D", "textOutput"),
        NodeInstance::new("C", "sum"),
        NodeInstance::new("B", "number").with("value", json!(2)),
        NodeInstance::new("A", "number").with("value", json!(1)),
    ];
    let edges = vec![
        Edge::new("A", "value", "C", "x"),
        Edge::new("B", "value", "C", "y"),
        Edge::new("C", "value", "D", "value"),
    ];

    let request = RunRequest::new(nodes, edges, vec!["D".into()]);
    let (snapshot, events) = run_recorded(&local_engine(), &test_registry(), request).await;

    assert_eq!(evaluation_order(&events), vec!["A", "B", "C", "D"]);
    assert_eq!(snapshot.node("D").unwrap().value(), Some(&json!(3)));
}

#[tokio::test]
async fn memo_covers_exactly_the_reachable_nodes() {
    let (mut nodes, mut edges) = diamond();
    nodes.push(NodeInstance::new("island", "number").with("value", json!(9)));
    nodes.push(NodeInstance::new("side", "textOutput"));
    edges.push(Edge::new("island", "value", "side", "value"));

    let targets = vec!["d".to_string()];
    let reachable = reachable_from(&nodes, &edges, &targets);
    let request = RunRequest::new(nodes, edges, targets);

    let (snapshot, _) = run_recorded(&local_engine(), &test_registry(), request).await;

    assert_eq!(snapshot.settled.len(), reachable.len());
    assert!(snapshot.settled.keys().all(|id| reachable.contains(id)));
    assert!(!snapshot.settled.contains_key("island"));
}

#[tokio::test]
async fn two_node_cycle_terminates() {
    let nodes = vec![NodeInstance::new("a", "sum"), NodeInstance::new("b", "sum")];
    let edges = vec![Edge::new("a", "value", "b", "x"), Edge::new("b", "value", "a", "x")];

    let request = RunRequest::new(nodes, edges, vec!["a".into()]);
    let (snapshot, events) = run_recorded(&local_engine(), &test_registry(), request).await;

    // `b` sees `a` as a cycle member and computes without it
    assert_eq!(evaluation_order(&events), vec!["b", "a"]);
    assert_eq!(snapshot.settled.get("a"), Some(&json!(0)));
    assert_eq!(snapshot.settled.get("b"), Some(&json!(0)));
}

#[tokio::test]
async fn rerun_is_idempotent() {
    let (nodes, edges) = diamond();
    let engine = local_engine();
    let registry = test_registry();

    let first = engine
        .run(RunRequest::new(nodes, edges, vec!["d".into()]), &registry, &nodeflow::runtime::NoopObserver)
        .await;
    let second = engine
        .run(
            RunRequest::new(first.nodes.clone(), first.edges.clone(), vec!["d".into()]),
            &registry,
            &nodeflow::runtime::NoopObserver,
        )
        .await;

    assert_eq!(first.settled, second.settled);
    assert_eq!(first.nodes, second.nodes);
    assert_eq!(first.labels(), second.labels());
}

#[tokio::test]
async fn run_all_evaluates_every_sink() {
    let nodes = vec![
        NodeInstance::new("n1", "number").with("value", json!(1)),
        NodeInstance::new("n2", "number").with("value", json!(2)),
        NodeInstance::new("out1", "textOutput"),
        NodeInstance::new("out2", "textOutput"),
    ];
    let edges = vec![
        Edge::new("n1", "value", "out1", "value"),
        Edge::new("n2", "value", "out2", "value"),
    ];

    let request = RunRequest::new(nodes, edges, Vec::new());
    let (snapshot, events) = run_recorded(&local_engine(), &test_registry(), request).await;

    assert_eq!(evaluation_order(&events), vec!["n1", "out1", "n2", "out2"]);
    assert_eq!(snapshot.node("out1").unwrap().value(), Some(&json!(1)));
    assert_eq!(snapshot.node("out2").unwrap().value(), Some(&json!(2)));
}

#[tokio::test]
async fn edge_labels_follow_settled_values() {
    let nodes = vec![
        NodeInstance::new("t", "textInput").with("text", json!("hi")),
        NodeInstance::new("o", "textOutput"),
        NodeInstance::new("s", "sum"),
        NodeInstance::new("n", "number").with("value", json!(5)),
        NodeInstance::new("stale", "number").with("value", json!(1)),
        NodeInstance::new("s2", "sum"),
    ];
    let mut stale_edge = Edge::new("stale", "value", "s2", "x");
    stale_edge.data.insert("label".into(), json!("old"));
    let edges = vec![
        Edge::new("t", "value", "o", "value"),
        Edge::new("o", "value", "s", "x"),
        Edge::new("n", "value", "s", "y"),
        stale_edge,
    ];

    let request = RunRequest::new(nodes, edges, vec!["s".into()]);
    let (snapshot, _) = run_recorded(&local_engine(), &test_registry(), request).await;
    let labels = snapshot.labels();

    assert_eq!(labels[&("t".to_string(), "o".to_string())], "hi");
    // textOutput opts out of showing its value on outgoing edges
    assert_eq!(labels[&("o".to_string(), "s".to_string())], "");
    assert_eq!(labels[&("n".to_string(), "s".to_string())], "5");
    // Not part of this run: label is cleared
    assert_eq!(labels[&("stale".to_string(), "s2".to_string())], "");
}

#[tokio::test]
async fn missing_nodes_and_types_do_not_stop_the_run() {
    let nodes = vec![
        NodeInstance::new("m", "mystery"),
        NodeInstance::new("out", "textOutput"),
        NodeInstance::new("out2", "textOutput"),
        NodeInstance::new("n", "number").with("value", json!(7)),
    ];
    let edges = vec![
        Edge::new("ghost", "value", "out", "value"),
        Edge::new("m", "value", "out2", "value"),
    ];

    let request = RunRequest::new(nodes, edges, vec!["out".into(), "out2".into(), "n".into()]);
    let (snapshot, events) = run_recorded(&local_engine(), &test_registry(), request).await;

    assert_eq!(failures(&events, "ghost").len(), 1);
    assert_eq!(failures(&events, "m").len(), 1);
    assert!(failures(&events, "m")[0].contains("mystery"));

    assert!(!snapshot.settled.contains_key("m"));
    assert_eq!(snapshot.settled.get("out"), Some(&Value::Null));
    assert_eq!(snapshot.settled.get("out2"), Some(&Value::Null));
    assert_eq!(snapshot.settled.get("n"), Some(&json!(7)));
}

#[tokio::test]
async fn observer_hooks_fire_in_scheduler_order() {
    let nodes = vec![
        NodeInstance::new("a", "number").with("value", json!(3)),
        NodeInstance::new("b", "textOutput"),
    ];
    let edges = vec![Edge::new("a", "value", "b", "value")];

    let request = RunRequest::new(nodes, edges, vec!["b".into()]);
    let (_, events) = run_recorded(&local_engine(), &test_registry(), request).await;

    let kinds: Vec<(String, &str)> = events
        .iter()
        .map(|e| {
            let kind = match e {
                NodeEvent::PreVisit { .. } => "pre",
                NodeEvent::PostVisit { .. } => "post",
                NodeEvent::EvaluationStart { .. } => "start",
                NodeEvent::EvaluationEnd { .. } => "end",
                NodeEvent::Patch { .. } => "patch",
                NodeEvent::Failed { .. } => "failed",
            };
            (e.node_id().to_string(), kind)
        })
        .collect();

    let expected = [
        ("b", "pre"),
        ("b", "post"),
        ("a", "pre"),
        ("a", "post"),
        ("a", "start"),
        ("a", "end"),
        ("b", "start"),
        ("b", "end"),
    ];
    let expected: Vec<(String, &str)> = expected.iter().map(|(id, k)| (id.to_string(), *k)).collect();
    assert_eq!(kinds, expected);
}

#[tokio::test]
async fn view_mirror_keeps_view_only_fields() {
    let nodes = vec![NodeInstance::new("n", "number").with("value", json!(4))];
    let request = RunRequest::new(nodes, Vec::new(), vec!["n".into()]);
    let (_, events) = run_recorded(&local_engine(), &test_registry(), request).await;

    let mut mirror = ViewMirror::new();
    let mut seeded = serde_json::Map::new();
    seeded.insert("selected".into(), json!(true));
    mirror.seed("n", seeded);
    for event in &events {
        mirror.apply(event);
    }

    let fields = mirror.get("n").unwrap();
    assert_eq!(fields.get("value"), Some(&json!(4)));
    assert_eq!(fields.get("selected"), Some(&json!(true)));
    assert_eq!(fields.get("evaluating"), Some(&json!(false)));
    assert_eq!(fields.get("traversing"), Some(&json!(false)));
}

#[tokio::test(start_paused = true)]
async fn pacing_applies_only_to_highlighted_phases() {
    let nodes = vec![NodeInstance::new("n", "number")];
    let engine = local_engine();
    let registry = test_registry();

    let options = RunOptions {
        pacing_delay_ms: 300,
        highlight_traversal: false,
        highlight_evaluation: true,
    };
    let started = tokio::time::Instant::now();
    let request = RunRequest::new(nodes, Vec::new(), vec!["n".into()]).with_options(options);
    let (snapshot, events) = run_recorded(&engine, &registry, request).await;
    let elapsed = started.elapsed();

    assert_eq!(snapshot.settled.get("n"), Some(&json!(0)));
    assert!(elapsed >= std::time::Duration::from_millis(300));
    assert!(elapsed < std::time::Duration::from_millis(600));
    // Hooks fire even for phases that are not paced
    assert!(events.iter().any(|e| matches!(e, NodeEvent::PreVisit { .. })));
}

#[tokio::test]
async fn empty_graph_is_returned_unchanged() {
    let request = RunRequest::new(Vec::new(), Vec::new(), Vec::new());
    let (snapshot, events) = run_recorded(&local_engine(), &test_registry(), request).await;

    assert!(snapshot.nodes.is_empty());
    assert!(snapshot.settled.is_empty());
    assert!(events.is_empty());
}
