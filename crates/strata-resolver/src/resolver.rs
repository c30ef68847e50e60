use strata_config::{TranslationTable, WorkflowSpec};
use strata_workflow::WorkflowGraph;

use crate::builder::build_abstract_graph;
use crate::error::ResolveError;
use crate::remap::remap;

/// Resolver turns a parsed specification into a graph ready for matching.
pub trait Resolver: Send + Sync {
  /// Resolve a specification into a fingerprinted graph.
  ///
  /// This process:
  /// 1. Builds nodes and edges, rejecting unknown predecessors and cycles
  /// 2. Materializes output names from task templates
  /// 3. Computes fingerprints, over concrete paths when a table is configured
  fn resolve(&self, spec: &WorkflowSpec) -> Result<WorkflowGraph, ResolveError>;
}

/// Standard resolver with an optional translation table.
///
/// Without a table the result is the abstract graph; with one it is remapped
/// onto the table's paths.
#[derive(Debug, Clone, Default)]
pub struct StandardResolver {
  table: Option<TranslationTable>,
}

impl StandardResolver {
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a resolver that remaps onto `table`.
  pub fn with_table(table: TranslationTable) -> Self {
    Self { table: Some(table) }
  }

  pub fn table(&self) -> Option<&TranslationTable> {
    self.table.as_ref()
  }
}

impl Resolver for StandardResolver {
  fn resolve(&self, spec: &WorkflowSpec) -> Result<WorkflowGraph, ResolveError> {
    let graph = build_abstract_graph(spec)?;
    match &self.table {
      Some(table) => remap(&graph, table),
      None => Ok(graph),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SPEC: &str = "F<>in1<>\nT<>t1<>in1<>cat in1 > out1<>main\nF<>out1<>t1\n";

  #[test]
  fn test_resolve_without_table_is_abstract() {
    let spec = WorkflowSpec::parse(SPEC).unwrap();
    let graph = StandardResolver::new().resolve(&spec).unwrap();
    assert!(graph.contains("in1"));
    assert!(graph.contains("out1"));
  }

  #[test]
  fn test_resolve_with_table_remaps() {
    let spec = WorkflowSpec::parse(SPEC).unwrap();
    let table: TranslationTable = [
      ("in1".to_string(), "raw/in1.txt".to_string()),
      ("out1".to_string(), "out/out1.txt".to_string()),
    ]
    .into_iter()
    .collect();

    let graph = StandardResolver::with_table(table).resolve(&spec).unwrap();
    assert!(graph.contains("raw/in1.txt"));
    assert_eq!(
      graph.get_node("t1").unwrap().command(),
      Some("cat raw/in1.txt > out/out1.txt")
    );
  }
}
