use std::collections::HashSet;

use strata_config::{TranslationTable, WorkflowSpec};
use strata_resolver::{Resolver, ResolveError, StandardResolver, build_abstract_graph, export_spec, remap};
use strata_workflow::{WorkflowGraph, WorkflowNode, file_fingerprint, match_graphs, task_fingerprint};

const TEMPLATED: &str = "\
# one input, one templated task
F<>in1<>
T<>t1<>in1<>echo *<>main<>out_*
F<>out1<>t1
";

const TWO_STAGE: &str = "\
F<>raw{1..2}<>
T<>clean<>raw1,raw2<>clean raw1 raw2 > mid<>prep
F<>mid<>clean
T<>fit<>mid<>fit mid > model<>train
F<>model<>fit
";

fn table(rows: &[(&str, &str)]) -> TranslationTable {
  rows
    .iter()
    .map(|(h, p)| (h.to_string(), p.to_string()))
    .collect()
}

/// A provenance graph with a single recorded run.
fn recorded_run(id: &str, inputs: &[&str], outputs: &[&str], command: &str) -> WorkflowGraph {
  let mut g = WorkflowGraph::new();
  g.add_node(WorkflowNode::task(id, command, "main", "")).unwrap();
  for path in inputs {
    g.ensure_node(WorkflowNode::file_at(path));
    g.add_edge(path, id).unwrap();
  }
  for path in outputs {
    g.ensure_node(WorkflowNode::file_at(path));
    g.add_edge(id, path).unwrap();
  }
  g.with_fingerprints()
}

#[test]
fn test_templated_output_label_and_fingerprint() {
  let spec = WorkflowSpec::parse(TEMPLATED).unwrap();
  let graph = build_abstract_graph(&spec).unwrap();

  assert_eq!(graph.get_node("out1").unwrap().label, "out_in1");
  assert_eq!(
    graph.get_node("t1").unwrap().fingerprint,
    task_fingerprint(&["in1", "out1"], "echo *")
  );
  assert_eq!(graph.get_node("in1").unwrap().fingerprint, file_fingerprint("in1"));
}

#[test]
fn test_export_then_parse_rebuilds_same_graph() {
  let graph = build_abstract_graph(&WorkflowSpec::parse(TWO_STAGE).unwrap()).unwrap();

  let text = export_spec(&graph).to_text();
  let rebuilt = build_abstract_graph(&WorkflowSpec::parse(&text).unwrap()).unwrap();

  assert_eq!(rebuilt.nodes, graph.nodes);
  let edges = |g: &WorkflowGraph| g.edges.iter().cloned().collect::<HashSet<_>>();
  assert_eq!(edges(&rebuilt), edges(&graph));
}

#[test]
fn test_fresh_spec_frontier_and_first_runnable_task() {
  let graph = build_abstract_graph(&WorkflowSpec::parse(TWO_STAGE).unwrap()).unwrap();
  let frontier: Vec<&str> = graph.frontier().iter().map(|n| n.name.as_str()).collect();
  assert_eq!(frontier, vec!["raw1", "raw2"]);
  let runnable: Vec<&str> = graph.runnable_tasks().iter().map(|n| n.name.as_str()).collect();
  assert_eq!(runnable, vec!["clean"]);
}

#[test]
fn test_remapped_graph_matches_recorded_run() {
  let spec = WorkflowSpec::parse(TWO_STAGE).unwrap();
  let t = table(&[
    ("raw1", "data/raw1.csv"),
    ("raw2", "data/raw2.csv"),
    ("mid", "work/mid.csv"),
    ("model", "work/model.bin"),
  ]);
  let graph = StandardResolver::with_table(t).resolve(&spec).unwrap();

  let provenance = recorded_run(
    "3f2a9c1",
    &["data/raw1.csv", "data/raw2.csv"],
    &["work/mid.csv"],
    "clean data/raw1.csv data/raw2.csv > work/mid.csv",
  );

  let outcome = match_graphs(&graph, &provenance);
  assert_eq!(
    outcome.completed(),
    vec!["clean", "data/raw1.csv", "data/raw2.csv", "work/mid.csv"]
  );

  let next: Vec<&str> = outcome
    .difference
    .runnable_tasks()
    .iter()
    .map(|n| n.name.as_str())
    .collect();
  assert_eq!(next, vec!["fit"]);
}

#[test]
fn test_remap_prefers_label_then_name() {
  let graph = build_abstract_graph(&WorkflowSpec::parse(TEMPLATED).unwrap()).unwrap();

  let by_label = remap(&graph, &table(&[("in1", "a"), ("out_in1", "b/out_in1")])).unwrap();
  assert!(by_label.contains("b/out_in1"));

  let by_name = remap(&graph, &table(&[("in1", "a"), ("out1", "b/out1")])).unwrap();
  assert!(by_name.contains("b/out1"));

  let err = remap(&graph, &table(&[("in1", "a")])).unwrap_err();
  assert!(matches!(err, ResolveError::UnresolvedHandle { ref handle } if handle == "out_in1"));
}
