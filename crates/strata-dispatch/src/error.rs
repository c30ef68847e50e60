use std::path::PathBuf;

use strata_provenance::ProvenanceError;
use strata_vcs::VcsError;
use thiserror::Error;

/// Errors that can occur while dispatching branches or reconciling them.
///
/// Branch-level errors are isolated: they end up in that branch's outcome
/// instead of aborting the dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
  /// The source repository is missing or is not a repository.
  #[error("repository unavailable at {}", path.display())]
  RepositoryUnavailable { path: PathBuf },

  /// The run primitive reported an error marker or a failed exit.
  #[error("run of task '{task}' on branch '{branch}' failed: {marker}")]
  RunFailed {
    branch: String,
    task: String,
    marker: String,
  },

  /// The branch was cancelled before it started.
  #[error("branch '{branch}' cancelled before start")]
  Cancelled { branch: String },

  /// A branch worker panicked.
  #[error("worker for branch '{branch}' panicked: {message}")]
  WorkerPanicked { branch: String, message: String },

  #[error(transparent)]
  Provenance(#[from] ProvenanceError),

  #[error(transparent)]
  Vcs(#[from] VcsError),
}
