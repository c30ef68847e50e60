//! Strata VCS
//!
//! The [`Vcs`] trait is the boundary to the versioned storage that serves as
//! the provenance ledger. History traversal, cloning, lazy data retrieval,
//! recorded runs, pushes and merges are primitives of the substrate; this
//! crate only describes them and provides a process-backed implementation.
//!
//! [`RepoLock`] serializes mutating operations on a shared repository path.

mod error;
mod git;
mod lock;
mod run;

pub use error::VcsError;
pub use git::GitVcs;
pub use lock::{RepoLock, lock_key};
pub use run::{RunOutput, RunRequest};

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// A commit reachable from a scanned revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
  pub id: String,
  /// Full commit message, summary line first.
  pub message: String,
}

impl Commit {
  pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      message: message.into(),
    }
  }

  /// First line of the message.
  pub fn summary(&self) -> &str {
    self.message.lines().next().unwrap_or_default().trim()
  }
}

/// Version-control substrate.
///
/// Paths are local working copies; `source` arguments may be paths or URLs.
#[async_trait]
pub trait Vcs: Send + Sync {
  /// Whether `path` is an existing repository working copy.
  async fn is_repository(&self, path: &Path) -> bool;

  /// Commits reachable from `rev`, newest first.
  async fn log(&self, repo: &Path, rev: &str) -> Result<Vec<Commit>, VcsError>;

  /// Paths of linked sub-repositories, relative to `repo`, recursively.
  async fn submodules(&self, repo: &Path) -> Result<Vec<PathBuf>, VcsError>;

  /// Clone `source` into `dest` and check out `branch`.
  async fn clone_repo(&self, source: &str, dest: &Path, branch: &str) -> Result<(), VcsError>;

  /// Install sub-repositories and metadata without fetching file content.
  async fn get_metadata(&self, repo: &Path) -> Result<(), VcsError>;

  /// Declare this copy disposable so it is never counted as holding content.
  async fn mark_dead(&self, repo: &Path) -> Result<(), VcsError>;

  /// Check out `branch`, creating or resetting it at HEAD when `create` is set.
  async fn checkout(&self, repo: &Path, branch: &str, create: bool) -> Result<(), VcsError>;

  /// Execute a command and record it as a run-record commit.
  ///
  /// A failing command is reported through [`RunOutput`], not as an error.
  async fn run(&self, request: &RunRequest) -> Result<RunOutput, VcsError>;

  /// Push `refname` to `remote`.
  async fn push(&self, repo: &Path, remote: &str, refname: &str) -> Result<(), VcsError>;

  /// Merge all `refs` into the current branch in one commit.
  async fn merge(&self, repo: &Path, refs: &[String], message: &str) -> Result<(), VcsError>;

  /// Record the current state of the working copy.
  async fn save(&self, repo: &Path, message: &str) -> Result<(), VcsError>;
}
