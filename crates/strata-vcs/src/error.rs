use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the version-control substrate.
#[derive(Debug, Error)]
pub enum VcsError {
  /// An external command ran and exited unsuccessfully.
  #[error("`{program} {args}` failed in {}: {status}: {stderr}", repo.display())]
  CommandFailed {
    program: String,
    args: String,
    repo: PathBuf,
    status: String,
    stderr: String,
  },

  /// An external command could not be started.
  #[error("failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The path is missing or is not a repository.
  #[error("repository unavailable at {}: {message}", path.display())]
  RepositoryUnavailable { path: PathBuf, message: String },

  /// A repository lock was held by someone else for too long.
  #[error("timed out after {waited_ms}ms waiting for lock {}", path.display())]
  LockTimeout { path: PathBuf, waited_ms: u64 },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}
