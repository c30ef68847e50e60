use std::path::PathBuf;

use strata_vcs::VcsError;
use strata_workflow::WorkflowError;
use thiserror::Error;

/// Errors that can occur while scanning repository history.
#[derive(Debug, Error)]
pub enum ProvenanceError {
  /// The scan target is missing or is not a repository.
  #[error("repository unavailable at {}: {message}", path.display())]
  RepositoryUnavailable { path: PathBuf, message: String },

  /// A commit carries the run-record marker but its payload cannot be read.
  #[error("malformed run-record in commit {commit}: {message}")]
  MalformedRunRecord { commit: String, message: String },

  /// Indexing the working tree did not complete.
  #[error("failed to index files under {}: {message}", path.display())]
  IndexFailed { path: PathBuf, message: String },

  #[error(transparent)]
  Vcs(#[from] VcsError),

  #[error(transparent)]
  Workflow(#[from] WorkflowError),
}
