use strata_workflow::WorkflowError;
use thiserror::Error;

/// Errors that can occur while building or remapping an abstract graph.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// A record lists a predecessor that no record declares.
  #[error("line {line}: unknown predecessor '{name}'")]
  UnknownPredecessor { line: usize, name: String },

  /// Two records declare the same node name.
  #[error("line {line}: duplicate node name '{name}'")]
  DuplicateNode { line: usize, name: String },

  /// The declared edges form a cycle.
  #[error("cycle detected in workflow graph at node '{node}'")]
  CycleDetected { node: String },

  /// The translation table has no entry for a handle.
  #[error("unresolved handle '{handle}': not in translation table")]
  UnresolvedHandle { handle: String },

  #[error(transparent)]
  Workflow(#[from] WorkflowError),
}
