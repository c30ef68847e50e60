//! Matching an abstract graph against a provenance graph.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::node::NodeStatus;
use crate::workflow::WorkflowGraph;

/// Result of matching an abstract graph against recorded provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
  /// The abstract graph with matched nodes marked complete.
  pub annotated: WorkflowGraph,
  /// The abstract graph with every matched node removed.
  pub difference: WorkflowGraph,
}

impl MatchOutcome {
  /// Names of abstract nodes found in the provenance graph, sorted.
  pub fn completed(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self
      .annotated
      .nodes
      .values()
      .filter(|n| n.is_complete())
      .map(|n| n.name.as_str())
      .collect();
    names.sort_unstable();
    names
  }
}

/// Compare `abstract_graph` with `provenance` by fingerprint.
///
/// Identity is the fingerprint, not the name: two nodes with different names
/// and the same fingerprint are the same unit of work. The caller's graph is
/// never modified.
pub fn match_graphs(abstract_graph: &WorkflowGraph, provenance: &WorkflowGraph) -> MatchOutcome {
  let recorded = provenance.fingerprints();

  let annotated = abstract_graph.map_nodes(|node| {
    if recorded.contains(node.fingerprint.as_str()) {
      node.with_status(NodeStatus::Complete)
    } else {
      node.clone()
    }
  });

  let complete: HashSet<&str> = annotated
    .nodes
    .values()
    .filter(|n| n.is_complete())
    .map(|n| n.name.as_str())
    .collect();

  debug!(
    abstract_nodes = abstract_graph.len(),
    provenance_nodes = provenance.len(),
    complete = complete.len(),
    "matched graphs"
  );

  let difference = abstract_graph.without_nodes(&complete);

  MatchOutcome {
    annotated,
    difference,
  }
}
