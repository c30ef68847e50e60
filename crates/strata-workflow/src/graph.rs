use std::collections::{BTreeSet, HashMap};

use crate::WorkflowNode;

/// Adjacency view over a workflow graph for traversal and analysis.
///
/// Neighbor lists keep the order in which edges were declared, which the
/// template propagation pass relies on for positional pairing.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Adjacency list: node name -> list of downstream node names.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: node name -> list of upstream node names.
  reverse_adjacency: HashMap<String, Vec<String>>,
  /// Nodes with no incoming edges, sorted by name.
  entry_points: Vec<String>,
}

impl Graph {
  /// Build a graph from nodes and edges.
  pub fn new(nodes: &HashMap<String, WorkflowNode>, edges: &[(String, String)]) -> Self {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for name in nodes.keys() {
      adjacency.entry(name.clone()).or_default();
      reverse_adjacency.entry(name.clone()).or_default();
    }

    for (from, to) in edges {
      adjacency.entry(from.clone()).or_default().push(to.clone());
      reverse_adjacency
        .entry(to.clone())
        .or_default()
        .push(from.clone());
    }

    let mut entry_points: Vec<String> = nodes
      .keys()
      .filter(|name| reverse_adjacency.get(*name).is_none_or(|v| v.is_empty()))
      .cloned()
      .collect();
    entry_points.sort();

    Self {
      adjacency,
      reverse_adjacency,
      entry_points,
    }
  }

  /// Nodes with no incoming edges.
  pub fn entry_points(&self) -> &[String] {
    &self.entry_points
  }

  /// Successors of a node in declaration order.
  pub fn downstream(&self, name: &str) -> &[String] {
    self
      .adjacency
      .get(name)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Predecessors of a node in declaration order.
  pub fn upstream(&self, name: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(name)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Union of predecessors and successors, sorted and deduplicated.
  pub fn neighbors(&self, name: &str) -> Vec<&str> {
    let mut out: Vec<&str> = self
      .upstream(name)
      .iter()
      .chain(self.downstream(name))
      .map(|s| s.as_str())
      .collect();
    out.sort_unstable();
    out.dedup();
    out
  }

  /// Entry points that also feed at least one other node.
  pub fn frontier(&self) -> Vec<&str> {
    self
      .entry_points
      .iter()
      .filter(|name| !self.downstream(name).is_empty())
      .map(|s| s.as_str())
      .collect()
  }

  /// Node names in dependency order, ties broken by name.
  ///
  /// Returns `None` when the graph has a cycle.
  pub fn topological_order(&self) -> Option<Vec<String>> {
    let mut in_degree: HashMap<&str, usize> = self
      .reverse_adjacency
      .iter()
      .map(|(name, up)| (name.as_str(), up.len()))
      .collect();
    let mut ready: BTreeSet<&str> = in_degree
      .iter()
      .filter(|(_, d)| **d == 0)
      .map(|(name, _)| *name)
      .collect();

    let mut order = Vec::with_capacity(in_degree.len());
    while let Some(name) = ready.pop_first() {
      order.push(name.to_string());
      for next in self.downstream(name) {
        if let Some(d) = in_degree.get_mut(next.as_str()) {
          *d -= 1;
          if *d == 0 {
            ready.insert(next.as_str());
          }
        }
      }
    }

    (order.len() == in_degree.len()).then_some(order)
  }

  /// Return the first node found on a cycle, if any.
  ///
  /// Depth-first search with white/gray/black coloring; a gray neighbor is a
  /// back edge.
  pub fn find_cycle(&self) -> Option<String> {
    let mut names: Vec<&str> = self.adjacency.keys().map(|s| s.as_str()).collect();
    names.sort_unstable();

    // 0 = unvisited, 1 = in progress, 2 = done
    let mut color: HashMap<&str, u8> = names.iter().map(|n| (*n, 0u8)).collect();

    fn dfs<'a>(
      node: &'a str,
      adjacency: &'a HashMap<String, Vec<String>>,
      color: &mut HashMap<&'a str, u8>,
    ) -> Option<String> {
      color.insert(node, 1);

      if let Some(neighbors) = adjacency.get(node) {
        for neighbor in neighbors {
          match color.get(neighbor.as_str()) {
            Some(1) => return Some(neighbor.clone()),
            Some(0) => {
              if let Some(hit) = dfs(neighbor.as_str(), adjacency, color) {
                return Some(hit);
              }
            }
            _ => {}
          }
        }
      }

      color.insert(node, 2);
      None
    }

    for name in names {
      if color.get(name) == Some(&0)
        && let Some(hit) = dfs(name, &self.adjacency, &mut color)
      {
        return Some(hit);
      }
    }

    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn build(names: &[&str], edges: &[(&str, &str)]) -> Graph {
    let nodes: HashMap<String, WorkflowNode> = names
      .iter()
      .map(|n| (n.to_string(), WorkflowNode::file(*n)))
      .collect();
    let edges: Vec<(String, String)> = edges
      .iter()
      .map(|(a, b)| (a.to_string(), b.to_string()))
      .collect();
    Graph::new(&nodes, &edges)
  }

  #[test]
  fn test_topological_order_breaks_ties_by_name() {
    let g = build(&["c", "b", "a", "d"], &[("b", "d"), ("a", "d"), ("c", "a")]);
    assert_eq!(
      g.topological_order().unwrap(),
      vec!["b", "c", "a", "d"]
    );
  }

  #[test]
  fn test_topological_order_none_on_cycle() {
    let g = build(&["a", "b"], &[("a", "b"), ("b", "a")]);
    assert!(g.topological_order().is_none());
    assert!(g.find_cycle().is_some());
  }

  #[test]
  fn test_neighbors_are_sorted_union() {
    let g = build(&["x", "t", "a", "z"], &[("z", "t"), ("x", "t"), ("t", "a"), ("t", "x")]);
    assert_eq!(g.neighbors("t"), vec!["a", "x", "z"]);
  }

  #[test]
  fn test_entry_points_sorted() {
    let g = build(&["c", "b", "a"], &[("a", "c"), ("b", "c")]);
    assert_eq!(g.entry_points(), &["a".to_string(), "b".to_string()]);
  }
}
