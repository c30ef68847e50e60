//! Dispatch of pending work across branches.
//!
//! Each requested branch is worked on by its own task, bounded by a
//! semaphore of `max_workers` permits. Reconciliation runs only after every
//! branch task has terminated.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use strata_config::DispatchConfig;
use strata_vcs::Vcs;
use strata_workflow::WorkflowGraph;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::branch::{BranchOutcome, BranchWorker};
use crate::error::DispatchError;
use crate::events::{DispatchEvent, DispatchNotifier, NoopNotifier};
use crate::reconcile::{ReconcileSummary, Reconciler};
use crate::report::DispatchReport;

/// Dispatches the runnable remainder of a workflow onto repository branches.
///
/// Generic over `N: DispatchNotifier`; use [`Dispatcher::new`] for no-op
/// notifications or [`Dispatcher::with_notifier`] to observe events.
pub struct Dispatcher<V: Vcs + 'static, N: DispatchNotifier + 'static = NoopNotifier> {
  vcs: Arc<V>,
  config: Arc<DispatchConfig>,
  notifier: Arc<N>,
}

impl<V: Vcs + 'static> Dispatcher<V, NoopNotifier> {
  pub fn new(vcs: Arc<V>, config: DispatchConfig) -> Self {
    Self::with_notifier(vcs, config, NoopNotifier)
  }
}

impl<V: Vcs + 'static, N: DispatchNotifier + 'static> Dispatcher<V, N> {
  pub fn with_notifier(vcs: Arc<V>, config: DispatchConfig, notifier: N) -> Self {
    Self {
      vcs,
      config: Arc::new(config),
      notifier: Arc::new(notifier),
    }
  }

  pub fn config(&self) -> &DispatchConfig {
    &self.config
  }

  /// Dispatch the next runnable task of `graph` on every branch in `branches`.
  ///
  /// `graph` must already be remapped onto concrete paths. Branch failures
  /// are reported in the returned report and never stop other branches.
  /// Cancellation is honored only before a branch starts.
  pub async fn dispatch(
    &self,
    source: &Path,
    graph: &WorkflowGraph,
    branches: &[String],
    cancel: CancellationToken,
  ) -> Result<DispatchReport, DispatchError> {
    if !self.vcs.is_repository(source).await {
      return Err(DispatchError::RepositoryUnavailable {
        path: source.to_path_buf(),
      });
    }

    let dispatch_id = uuid::Uuid::new_v4().to_string();
    let started_at = Utc::now();
    info!(dispatch_id = %dispatch_id, branches = branches.len(), workers = self.config.max_workers, "dispatch started");
    self.notifier.notify(DispatchEvent::DispatchStarted {
      dispatch_id: dispatch_id.clone(),
      branches: branches.len(),
    });

    let permits = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
    let graph = Arc::new(graph.clone());

    let handles: Vec<_> = branches
      .iter()
      .map(|branch| {
        let worker = BranchWorker {
          vcs: self.vcs.clone(),
          config: self.config.clone(),
          notifier: self.notifier.clone(),
          graph: graph.clone(),
          source: source.to_path_buf(),
          branch: branch.clone(),
          dispatch_id: dispatch_id.clone(),
        };
        let permits = permits.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
          let Ok(_permit) = permits.acquire_owned().await else {
            return BranchOutcome::cancelled(worker.branch);
          };
          if cancel.is_cancelled() {
            info!(branch = %worker.branch, "cancelled before start");
            return BranchOutcome::cancelled(worker.branch);
          }
          worker.run().await
        })
      })
      .collect();

    // Barrier: every branch terminates before anything is merged.
    let outcomes: Vec<BranchOutcome> = join_all(handles)
      .await
      .into_iter()
      .zip(branches)
      .map(|(joined, branch)| {
        joined.unwrap_or_else(|e| {
          let err = DispatchError::WorkerPanicked {
            branch: branch.clone(),
            message: e.to_string(),
          };
          error!(error = %err, "branch worker aborted");
          BranchOutcome::failed(branch, &err)
        })
      })
      .collect();

    let reconcile = self.reconcile(source, &outcomes, branches, &dispatch_id).await;

    self.notifier.notify(DispatchEvent::DispatchCompleted {
      dispatch_id: dispatch_id.clone(),
    });
    let report = DispatchReport {
      dispatch_id,
      started_at,
      finished_at: Utc::now(),
      branches: outcomes,
      reconcile,
    };
    info!(
      succeeded = report.succeeded().count(),
      failed = report.failed().count(),
      merges = report.reconcile.merges.len(),
      "dispatch finished"
    );
    Ok(report)
  }

  async fn reconcile(
    &self,
    source: &Path,
    outcomes: &[BranchOutcome],
    branches: &[String],
    dispatch_id: &str,
  ) -> ReconcileSummary {
    let job_refs = outcomes.iter().filter(|o| o.is_pushed()).count();
    self.notifier.notify(DispatchEvent::ReconcileStarted {
      dispatch_id: dispatch_id.to_string(),
      job_refs,
    });

    let reconciler = Reconciler {
      vcs: self.vcs.clone(),
      config: self.config.clone(),
    };
    let summary = reconciler.reconcile(source, outcomes, branches).await;
    match &summary.error {
      None => self.notifier.notify(DispatchEvent::ReconcileCompleted {
        dispatch_id: dispatch_id.to_string(),
        merged: summary.merges.len(),
      }),
      Some(e) => {
        error!(error = %e, merged = summary.merges.len(), "reconcile failed");
        self.notifier.notify(DispatchEvent::ReconcileFailed {
          dispatch_id: dispatch_id.to_string(),
          error: e.clone(),
        });
      }
    }
    summary
  }
}
