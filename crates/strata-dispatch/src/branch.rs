//! Per-branch state machine.
//!
//! `Pending -> Cloned -> Prepared -> FrontierComputed -> Dispatched ->
//! Succeeded -> Pushed`, with `Failed` reachable from every working state.
//! A branch whose difference graph has no runnable task stops at
//! `FrontierComputed`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_config::DispatchConfig;
use strata_provenance::{ProvenanceScanner, owning_subrepos};
use strata_vcs::{RepoLock, RunRequest, Vcs, lock_key};
use strata_workflow::{WorkflowGraph, WorkflowNode, match_graphs};
use tracing::{Instrument, debug, error, info, info_span};

use crate::error::DispatchError;
use crate::events::{DispatchEvent, DispatchNotifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchState {
  Pending,
  Cloned,
  Prepared,
  FrontierComputed,
  Dispatched,
  Succeeded,
  Failed,
  Pushed,
  Cancelled,
}

impl fmt::Display for BranchState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      BranchState::Pending => "pending",
      BranchState::Cloned => "cloned",
      BranchState::Prepared => "prepared",
      BranchState::FrontierComputed => "frontier_computed",
      BranchState::Dispatched => "dispatched",
      BranchState::Succeeded => "succeeded",
      BranchState::Failed => "failed",
      BranchState::Pushed => "pushed",
      BranchState::Cancelled => "cancelled",
    };
    f.write_str(name)
  }
}

/// Result of working on one branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchOutcome {
  pub branch: String,
  pub state: BranchState,
  /// Last state reached before failing.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub failed_at: Option<BranchState>,
  /// Task that was run, if any was runnable.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub task: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub job_ref: Option<String>,
  /// Sub-repositories holding the task's outputs; `""` is the top level.
  #[serde(default)]
  pub touched: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub clone_path: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl BranchOutcome {
  pub fn new(branch: impl Into<String>) -> Self {
    Self {
      branch: branch.into(),
      state: BranchState::Pending,
      failed_at: None,
      task: None,
      job_ref: None,
      touched: Vec::new(),
      clone_path: None,
      error: None,
    }
  }

  pub fn failed(branch: impl Into<String>, error: &DispatchError) -> Self {
    let mut outcome = Self::new(branch);
    outcome.fail(error);
    outcome
  }

  pub fn cancelled(branch: impl Into<String>) -> Self {
    let branch = branch.into();
    let error = DispatchError::Cancelled {
      branch: branch.clone(),
    };
    Self {
      state: BranchState::Cancelled,
      error: Some(error.to_string()),
      ..Self::new(branch)
    }
  }

  fn fail(&mut self, error: &DispatchError) {
    self.failed_at = Some(self.state);
    self.state = BranchState::Failed;
    self.error = Some(error.to_string());
  }

  /// Whether this branch produced a job ref to merge.
  pub fn is_pushed(&self) -> bool {
    self.state == BranchState::Pushed
  }

  pub fn is_failed(&self) -> bool {
    matches!(self.state, BranchState::Failed | BranchState::Cancelled)
  }
}

/// Works one branch through its states.
pub(crate) struct BranchWorker<V: Vcs, N: DispatchNotifier> {
  pub vcs: Arc<V>,
  pub config: Arc<DispatchConfig>,
  pub notifier: Arc<N>,
  pub graph: Arc<WorkflowGraph>,
  pub source: PathBuf,
  pub branch: String,
  pub dispatch_id: String,
}

impl<V: Vcs, N: DispatchNotifier> BranchWorker<V, N> {
  pub async fn run(self) -> BranchOutcome {
    let span = info_span!("branch", branch = %self.branch, dispatch_id = %self.dispatch_id);
    self.run_inner().instrument(span).await
  }

  async fn run_inner(self) -> BranchOutcome {
    let mut outcome = BranchOutcome::new(&self.branch);
    self.notifier.notify(DispatchEvent::BranchStarted {
      dispatch_id: self.dispatch_id.clone(),
      branch: self.branch.clone(),
    });

    match self.execute(&mut outcome).await {
      Ok(()) => {
        info!(state = %outcome.state, task = ?outcome.task, "branch finished");
        self.notifier.notify(DispatchEvent::BranchSucceeded {
          dispatch_id: self.dispatch_id.clone(),
          branch: self.branch.clone(),
          job_ref: outcome.job_ref.clone(),
        });
        if let Some(clone) = &outcome.clone_path
          && let Err(e) = tokio::fs::remove_dir_all(clone).await
        {
          debug!(clone = %clone.display(), error = %e, "could not remove clone");
        }
      }
      Err(e) => {
        outcome.fail(&e);
        error!(error = %e, failed_at = ?outcome.failed_at, "branch failed");
        self.notifier.notify(DispatchEvent::BranchFailed {
          dispatch_id: self.dispatch_id.clone(),
          branch: self.branch.clone(),
          error: e.to_string(),
        });
      }
    }

    outcome
  }

  async fn execute(&self, outcome: &mut BranchOutcome) -> Result<(), DispatchError> {
    let suffix = short_id();
    let clone = self
      .config
      .clone_root
      .join(format!("{}-{}", lock_key(&self.branch), suffix));
    let source = self.source.to_string_lossy().into_owned();

    {
      let _lock = self.lock(&source).await?;
      self.vcs.clone_repo(&source, &clone, &self.branch).await?;
    }
    outcome.clone_path = Some(clone.clone());
    self.advance(outcome, BranchState::Cloned);

    self.vcs.get_metadata(&clone).await?;
    let subrepos = self.vcs.submodules(&clone).await?;
    self.vcs.mark_dead(&clone).await?;
    for sub in &subrepos {
      self.vcs.mark_dead(&clone.join(sub)).await?;
    }
    self.advance(outcome, BranchState::Prepared);

    let provenance = ProvenanceScanner::new(self.vcs.clone())
      .with_superdataset(self.config.superdataset)
      .scan(&clone, "HEAD")
      .await?;
    let matched = match_graphs(&self.graph, &provenance);
    let next = matched.difference.runnable_tasks().first().map(|t| (*t).clone());
    self.advance(outcome, BranchState::FrontierComputed);

    let Some(task) = next else {
      info!(completed = matched.completed().len(), "nothing left to run");
      return Ok(());
    };
    outcome.task = Some(task.name.clone());

    let request = self.run_request(&clone, &task);
    self.advance(outcome, BranchState::Dispatched);
    info!(task = %task.name, inputs = request.inputs.len(), outputs = request.outputs.len(), "dispatching task");
    let output = self.vcs.run(&request).await?;
    if let Some(marker) = output.failure(&self.config.error_markers) {
      return Err(DispatchError::RunFailed {
        branch: self.branch.clone(),
        task: task.name.clone(),
        marker,
      });
    }
    self.advance(outcome, BranchState::Succeeded);

    let job_ref = self.config.job_ref(&self.branch, &suffix);
    let touched = touched_repos(&request.outputs, &subrepos);
    for sub in &touched {
      let repo = join_subrepo(&clone, sub);
      self.vcs.checkout(&repo, &job_ref, true).await?;
      let target = join_subrepo(&self.source, sub).to_string_lossy().into_owned();
      let _lock = self.lock(&target).await?;
      self.vcs.push(&repo, &self.config.remote, &job_ref).await?;
    }
    outcome.touched = touched;
    outcome.job_ref = Some(job_ref);
    self.advance(outcome, BranchState::Pushed);

    Ok(())
  }

  fn run_request(&self, clone: &Path, task: &WorkflowNode) -> RunRequest {
    let paths = |names: Vec<&str>| -> Vec<String> {
      names
        .into_iter()
        .map(|name| {
          self
            .graph
            .get_node(name)
            .and_then(WorkflowNode::file_path)
            .unwrap_or_else(|| name.to_string())
        })
        .collect()
    };
    RunRequest {
      repo: clone.to_path_buf(),
      message: task.label.clone(),
      inputs: paths(self.graph.predecessors(&task.name)),
      outputs: paths(self.graph.successors(&task.name)),
      command: task.command().unwrap_or_default().to_string(),
    }
  }

  async fn lock(&self, repo: &str) -> Result<RepoLock, DispatchError> {
    Ok(
      RepoLock::acquire(
        &self.config.lock_dir,
        repo,
        Duration::from_millis(self.config.lock_timeout_ms),
        Duration::from_millis(self.config.lock_poll_ms),
      )
      .await?,
    )
  }

  fn advance(&self, outcome: &mut BranchOutcome, state: BranchState) {
    outcome.state = state;
    debug!(state = %state, "branch state changed");
    self.notifier.notify(DispatchEvent::BranchStateChanged {
      dispatch_id: self.dispatch_id.clone(),
      branch: self.branch.clone(),
      state,
    });
  }
}

/// Location of sub-repository `sub` under `root`; `""` is `root` itself.
pub(crate) fn join_subrepo(root: &Path, sub: &str) -> PathBuf {
  if sub.is_empty() {
    root.to_path_buf()
  } else {
    root.join(sub)
  }
}

/// Repositories a run changed: the sub-repositories owning its outputs, then
/// the clone root, which holds the run-record commit.
fn touched_repos(outputs: &[String], subrepos: &[PathBuf]) -> Vec<String> {
  let mut touched = owning_subrepos(outputs.iter().map(String::as_str), subrepos);
  touched.retain(|sub| !sub.is_empty());
  touched.push(String::new());
  touched
}

fn short_id() -> String {
  uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
