use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("duplicate node name: {0}")]
  DuplicateNode(String),

  #[error("edge references unknown node: from={from}, to={to}")]
  InvalidEdge { from: String, to: String },

  #[error("cycle detected in workflow graph at node '{node}'")]
  CycleDetected { node: String },
}
