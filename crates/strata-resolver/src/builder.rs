//! Abstract graph construction.
//!
//! Building happens in two passes. The structural pass creates one node per
//! declared name and one edge per (predecessor, node) pair. The propagation
//! pass then materializes output names from task templates; fingerprints are
//! computed only after that, because a task's neighbor labels are not final
//! until every upstream template has been applied.

use std::collections::HashMap;

use strata_config::{Record, WorkflowSpec};
use strata_workflow::{DEFAULT_GROUP, WorkflowError, WorkflowGraph, WorkflowNode};
use tracing::debug;

use crate::error::ResolveError;

/// Build the abstract graph described by `spec`.
pub fn build_abstract_graph(spec: &WorkflowSpec) -> Result<WorkflowGraph, ResolveError> {
  let structure = build_structure(spec)?;
  let propagated = propagate_templates(&structure);
  let graph = propagated.with_fingerprints();

  let summary = graph.summary();
  debug!(
    nodes = summary.nodes,
    edges = summary.edges,
    tasks = summary.tasks,
    "built abstract graph"
  );

  Ok(graph)
}

/// Structural pass: nodes and edges with placeholder fingerprints.
pub fn build_structure(spec: &WorkflowSpec) -> Result<WorkflowGraph, ResolveError> {
  let mut graph = WorkflowGraph::new();

  for rec in &spec.records {
    let nodes: Vec<WorkflowNode> = match &rec.record {
      Record::File(file) => file.names.iter().map(WorkflowNode::file).collect(),
      Record::Task(task) => {
        let group = if task.group.is_empty() {
          DEFAULT_GROUP
        } else {
          task.group.as_str()
        };
        vec![WorkflowNode::task(
          &task.name,
          &task.command,
          group,
          &task.output_template,
        )]
      }
    };

    for node in nodes {
      graph.add_node(node).map_err(|e| match e {
        WorkflowError::DuplicateNode(name) => ResolveError::DuplicateNode {
          line: rec.line,
          name,
        },
        other => other.into(),
      })?;
    }
  }

  for rec in &spec.records {
    let (names, predecessors): (Vec<&str>, &[String]) = match &rec.record {
      Record::File(file) => (
        file.names.iter().map(|s| s.as_str()).collect(),
        &file.predecessors,
      ),
      Record::Task(task) => (vec![task.name.as_str()], &task.predecessors),
    };

    for pred in predecessors {
      if !graph.contains(pred) {
        return Err(ResolveError::UnknownPredecessor {
          line: rec.line,
          name: pred.clone(),
        });
      }
      for name in &names {
        graph.add_edge(pred, name)?;
      }
    }
  }

  graph.ensure_acyclic().map_err(|e| match e {
    WorkflowError::CycleDetected { node } => ResolveError::CycleDetected { node },
    other => other.into(),
  })?;

  Ok(graph)
}

/// Propagation pass: apply each task's output template to its successors.
///
/// With as many predecessors as successors, predecessor `i` names successor
/// `i`; otherwise every successor's own label is substituted. Tasks are
/// visited in dependency order so upstream labels are final before use.
pub fn propagate_templates(graph: &WorkflowGraph) -> WorkflowGraph {
  let view = graph.graph();
  let mut labels: HashMap<String, String> = graph
    .nodes
    .values()
    .map(|n| (n.name.clone(), n.label.clone()))
    .collect();

  // The structural pass already rejected cycles.
  let order = view.topological_order().unwrap_or_default();

  for name in &order {
    let Some(node) = graph.get_node(name) else {
      continue;
    };
    let template = node.output_template();
    if template.is_empty() {
      continue;
    }

    let preds = view.upstream(name);
    let succs = view.downstream(name);

    if preds.len() == succs.len() {
      for (pred, succ) in preds.iter().zip(succs) {
        let materialized = template.replace('*', &labels[pred]);
        labels.insert(succ.clone(), materialized);
      }
    } else {
      for succ in succs {
        let materialized = template.replace('*', &labels[succ]);
        labels.insert(succ.clone(), materialized);
      }
    }
  }

  graph.map_nodes(|node| match labels.get(&node.name) {
    Some(label) if *label != node.label => node.with_label(label.clone()),
    _ => node.clone(),
  })
}
