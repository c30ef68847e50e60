//! Translation of abstract handles into concrete paths.
//!
//! Provenance fingerprints are always computed over concrete paths, so an
//! abstract graph must be remapped before it is matched.

use std::collections::HashMap;

use strata_config::TranslationTable;
use strata_workflow::{NodeKind, WorkflowGraph, WorkflowNode};
use tracing::debug;

use crate::error::ResolveError;

/// Replace every file handle in `graph` with its path from `table`.
///
/// File nodes are looked up by label (the materialized name), falling back to
/// their name. Task commands have every handle token replaced by its path.
/// Fingerprints are recomputed over the resolved names.
pub fn remap(graph: &WorkflowGraph, table: &TranslationTable) -> Result<WorkflowGraph, ResolveError> {
  let handles = table.handles_longest_first();
  let mut replacements: HashMap<String, WorkflowNode> = HashMap::new();

  for node in graph.sorted_nodes() {
    let replacement = match &node.kind {
      NodeKind::File { .. } => {
        let path = table
          .get(&node.label)
          .or_else(|| table.get(&node.name))
          .ok_or_else(|| ResolveError::UnresolvedHandle {
            handle: node.label.clone(),
          })?;
        WorkflowNode {
          status: node.status,
          group: node.group.clone(),
          ..WorkflowNode::file_at(path)
        }
      }
      NodeKind::Task {
        command,
        output_template,
        pce,
      } => WorkflowNode {
        kind: NodeKind::Task {
          command: substitute_handles(command, &handles, table),
          output_template: output_template.clone(),
          pce: *pce,
        },
        ..node.clone()
      },
    };
    replacements.insert(node.name.clone(), replacement);
  }

  let remapped = graph.rename_nodes(&replacements)?.with_fingerprints();
  debug!(nodes = remapped.len(), handles = table.len(), "remapped abstract graph");
  Ok(remapped)
}

/// Characters that can be part of a handle or path token.
fn is_token_char(c: char) -> bool {
  c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/')
}

/// Replace whole-token handle occurrences in `command` in a single scan.
///
/// `handles` must be ordered longest first so overlapping handles resolve to
/// the longest match. Substituted paths are not scanned again.
pub fn substitute_handles(command: &str, handles: &[&str], table: &TranslationTable) -> String {
  let mut out = String::with_capacity(command.len());
  let mut rest = command;
  let mut prev: Option<char> = None;

  'scan: while !rest.is_empty() {
    if prev.is_none_or(|c| !is_token_char(c)) {
      for handle in handles {
        if let Some(after) = rest.strip_prefix(handle)
          && after.chars().next().is_none_or(|c| !is_token_char(c))
          && let Some(path) = table.get(handle)
        {
          out.push_str(path);
          prev = handle.chars().last();
          rest = after;
          continue 'scan;
        }
      }
    }

    let Some(c) = rest.chars().next() else {
      break;
    };
    out.push(c);
    prev = Some(c);
    rest = &rest[c.len_utf8()..];
  }

  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use strata_workflow::task_fingerprint;

  fn table(rows: &[(&str, &str)]) -> TranslationTable {
    rows
      .iter()
      .map(|(h, p)| (h.to_string(), p.to_string()))
      .collect()
  }

  fn graph() -> WorkflowGraph {
    let mut g = WorkflowGraph::new();
    g.add_node(WorkflowNode::file("in1")).unwrap();
    g.add_node(WorkflowNode::task("t1", "sort in1 > out1", "main", "")).unwrap();
    g.add_node(WorkflowNode::file("out1")).unwrap();
    g.add_edge("in1", "t1").unwrap();
    g.add_edge("t1", "out1").unwrap();
    g.with_fingerprints()
  }

  #[test]
  fn test_substitutes_whole_tokens_only() {
    let t = table(&[("in1", "raw/a.txt"), ("in10", "raw/j.txt")]);
    let handles = t.handles_longest_first();
    assert_eq!(
      substitute_handles("cat in1 in10 bin1 in1.bak > in1", &handles, &t),
      "cat raw/a.txt raw/j.txt bin1 in1.bak > raw/a.txt"
    );
  }

  #[test]
  fn test_substitution_is_not_recursive() {
    let t = table(&[("a", "b"), ("b", "c")]);
    let handles = t.handles_longest_first();
    assert_eq!(substitute_handles("a b", &handles, &t), "b c");
  }

  #[test]
  fn test_quoted_and_redirected_handles() {
    let t = table(&[("in1", "x.csv")]);
    let handles = t.handles_longest_first();
    assert_eq!(
      substitute_handles("wc -l \"in1\"<in1", &handles, &t),
      "wc -l \"x.csv\"<x.csv"
    );
  }

  #[test]
  fn test_remap_renames_files_and_rewrites_command() {
    let t = table(&[("in1", "data/in1.txt"), ("out1", "derived/out1.txt")]);
    let remapped = remap(&graph(), &t).unwrap();

    assert!(remapped.contains("data/in1.txt"));
    assert!(remapped.contains("derived/out1.txt"));
    let task = remapped.get_node("t1").unwrap();
    assert_eq!(task.command(), Some("sort data/in1.txt > derived/out1.txt"));
    assert_eq!(
      task.fingerprint,
      task_fingerprint(
        &["data/in1.txt", "derived/out1.txt"],
        "sort data/in1.txt > derived/out1.txt"
      )
    );
    let out = remapped.get_node("derived/out1.txt").unwrap();
    assert_eq!(out.label, "out1.txt");
    assert_eq!(out.file_path().as_deref(), Some("derived/out1.txt"));
  }

  #[test]
  fn test_remap_uses_materialized_label() {
    let mut g = graph();
    let renamed = g.get_node("out1").unwrap().with_label("out_in1");
    g.nodes.insert("out1".to_string(), renamed);

    let t = table(&[("in1", "a"), ("out_in1", "b/out_in1")]);
    let remapped = remap(&g, &t).unwrap();
    assert!(remapped.contains("b/out_in1"));
  }

  #[test]
  fn test_missing_handle_is_error() {
    let t = table(&[("in1", "data/in1.txt")]);
    let err = remap(&graph(), &t).unwrap_err();
    assert!(matches!(err, ResolveError::UnresolvedHandle { ref handle } if handle == "out1"));
  }

  #[test]
  fn test_remap_leaves_input_graph_alone() {
    let g = graph();
    let before = g.clone();
    let t = table(&[("in1", "a"), ("out1", "b")]);
    remap(&g, &t).unwrap();
    assert_eq!(g, before);
  }
}
