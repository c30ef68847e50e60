use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::fingerprint::{file_fingerprint, task_fingerprint};
use crate::graph::Graph;
use crate::node::{NodeKind, NodeStatus, WorkflowNode};

/// A directed graph of file and task nodes.
///
/// Nodes are keyed by name; edges are (producer, consumer) pairs kept in
/// declaration order with no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
  pub nodes: HashMap<String, WorkflowNode>,
  pub edges: Vec<(String, String)>,
}

/// Counts shown alongside a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
  pub nodes: usize,
  pub edges: usize,
  pub tasks: usize,
  pub files: usize,
  pub complete_tasks: usize,
}

impl WorkflowGraph {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build the adjacency view for traversal.
  pub fn graph(&self) -> Graph {
    Graph::new(&self.nodes, &self.edges)
  }

  pub fn get_node(&self, name: &str) -> Option<&WorkflowNode> {
    self.nodes.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.nodes.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Insert a node; names are unique within a graph.
  pub fn add_node(&mut self, node: WorkflowNode) -> Result<(), WorkflowError> {
    if self.nodes.contains_key(&node.name) {
      return Err(WorkflowError::DuplicateNode(node.name));
    }
    self.nodes.insert(node.name.clone(), node);
    Ok(())
  }

  /// Insert a node unless one with the same name already exists.
  pub fn ensure_node(&mut self, node: WorkflowNode) {
    self.nodes.entry(node.name.clone()).or_insert(node);
  }

  /// Add an edge between two existing nodes.
  ///
  /// Returns `false` when the edge was already present.
  pub fn add_edge(&mut self, from: &str, to: &str) -> Result<bool, WorkflowError> {
    if !self.nodes.contains_key(from) || !self.nodes.contains_key(to) {
      return Err(WorkflowError::InvalidEdge {
        from: from.to_string(),
        to: to.to_string(),
      });
    }
    if self.edges.iter().any(|(f, t)| f == from && t == to) {
      return Ok(false);
    }
    self.edges.push((from.to_string(), to.to_string()));
    Ok(true)
  }

  /// Predecessor names in declaration order.
  pub fn predecessors(&self, name: &str) -> Vec<&str> {
    self
      .edges
      .iter()
      .filter(|(_, to)| to == name)
      .map(|(from, _)| from.as_str())
      .collect()
  }

  /// Successor names in declaration order.
  pub fn successors(&self, name: &str) -> Vec<&str> {
    self
      .edges
      .iter()
      .filter(|(from, _)| from == name)
      .map(|(_, to)| to.as_str())
      .collect()
  }

  /// Fail if the graph contains a cycle.
  pub fn ensure_acyclic(&self) -> Result<(), WorkflowError> {
    match self.graph().find_cycle() {
      Some(node) => Err(WorkflowError::CycleDetected { node }),
      None => Ok(()),
    }
  }

  /// Copy of this graph without the given nodes or any edge touching them.
  pub fn without_nodes(&self, removed: &HashSet<&str>) -> WorkflowGraph {
    WorkflowGraph {
      nodes: self
        .nodes
        .iter()
        .filter(|(name, _)| !removed.contains(name.as_str()))
        .map(|(name, node)| (name.clone(), node.clone()))
        .collect(),
      edges: self
        .edges
        .iter()
        .filter(|(from, to)| !removed.contains(from.as_str()) && !removed.contains(to.as_str()))
        .cloned()
        .collect(),
    }
  }

  /// Copy of this graph with every node replaced by `f(node)`.
  ///
  /// `f` must not change node names.
  pub fn map_nodes<F>(&self, mut f: F) -> WorkflowGraph
  where
    F: FnMut(&WorkflowNode) -> WorkflowNode,
  {
    WorkflowGraph {
      nodes: self
        .nodes
        .iter()
        .map(|(name, node)| (name.clone(), f(node)))
        .collect(),
      edges: self.edges.clone(),
    }
  }

  /// Copy of this graph with nodes renamed through `renames`.
  ///
  /// Names missing from the map are kept. Two nodes renamed onto the same
  /// name are a `DuplicateNode` error.
  pub fn rename_nodes(
    &self,
    renames: &HashMap<String, WorkflowNode>,
  ) -> Result<WorkflowGraph, WorkflowError> {
    let new_name = |name: &str| -> String {
      renames
        .get(name)
        .map(|n| n.name.clone())
        .unwrap_or_else(|| name.to_string())
    };

    let mut out = WorkflowGraph::new();
    for (name, node) in &self.nodes {
      let replacement = renames.get(name).cloned().unwrap_or_else(|| node.clone());
      out.add_node(replacement)?;
    }
    for (from, to) in &self.edges {
      out.add_edge(&new_name(from), &new_name(to))?;
    }
    Ok(out)
  }

  /// Copy of this graph with every fingerprint recomputed.
  ///
  /// Files use their path; tasks use their sorted neighbor names plus command.
  pub fn with_fingerprints(&self) -> WorkflowGraph {
    let graph = self.graph();
    self.map_nodes(|node| {
      let fingerprint = match &node.kind {
        NodeKind::File { .. } => file_fingerprint(&node.file_path().unwrap_or_default()),
        NodeKind::Task { command, .. } => task_fingerprint(&graph.neighbors(&node.name), command),
      };
      node.with_fingerprint(fingerprint)
    })
  }

  /// Set of all node fingerprints.
  pub fn fingerprints(&self) -> HashSet<&str> {
    self
      .nodes
      .values()
      .map(|node| node.fingerprint.as_str())
      .filter(|fp| !fp.is_empty())
      .collect()
  }

  /// Nodes with no incoming edge and at least one outgoing edge, by name.
  ///
  /// Node kind is not checked; use [`WorkflowGraph::runnable_tasks`] for
  /// commands that can be executed.
  pub fn frontier(&self) -> Vec<&WorkflowNode> {
    self
      .graph()
      .frontier()
      .into_iter()
      .filter_map(|name| self.nodes.get(name))
      .collect()
  }

  /// Tasks whose inputs are all available, by name.
  ///
  /// A task is runnable when every predecessor is a file that nothing in
  /// this graph produces. On a difference graph that is a task whose
  /// producers have all been matched against the ledger.
  pub fn runnable_tasks(&self) -> Vec<&WorkflowNode> {
    let graph = self.graph();
    self
      .sorted_nodes()
      .into_iter()
      .filter(|node| {
        node.is_task()
          && graph.upstream(&node.name).iter().all(|pred| {
            self.nodes.get(pred).is_some_and(|p| p.is_file()) && graph.upstream(pred).is_empty()
          })
      })
      .collect()
  }

  /// Nodes sorted by name.
  pub fn sorted_nodes(&self) -> Vec<&WorkflowNode> {
    let mut nodes: Vec<&WorkflowNode> = self.nodes.values().collect();
    nodes.sort_by(|a, b| a.name.cmp(&b.name));
    nodes
  }

  pub fn summary(&self) -> GraphSummary {
    let tasks = self.nodes.values().filter(|n| n.is_task()).count();
    GraphSummary {
      nodes: self.nodes.len(),
      edges: self.edges.len(),
      tasks,
      files: self.nodes.len() - tasks,
      complete_tasks: self
        .nodes
        .values()
        .filter(|n| n.is_task() && n.status == NodeStatus::Complete)
        .count(),
    }
  }
}
