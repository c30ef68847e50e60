//! Merging pushed job refs back into the source repository.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_config::DispatchConfig;
use strata_vcs::{RepoLock, Vcs};
use tracing::info;

use crate::branch::{BranchOutcome, join_subrepo};
use crate::error::DispatchError;

/// One octopus merge performed in a sub-repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRecord {
  /// Sub-repository path; `""` is the top level.
  pub subrepo: String,
  pub job_refs: Vec<String>,
}

/// What reconciliation did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
  pub merges: Vec<MergeRecord>,
  /// Branches whose state was saved after merging.
  pub saved: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

/// Job refs of pushed branches, grouped by sub-repository.
pub fn merge_plan(outcomes: &[BranchOutcome]) -> BTreeMap<String, Vec<String>> {
  let mut plan: BTreeMap<String, Vec<String>> = BTreeMap::new();
  for outcome in outcomes.iter().filter(|o| o.is_pushed()) {
    let Some(job_ref) = &outcome.job_ref else {
      continue;
    };
    for sub in &outcome.touched {
      plan.entry(sub.clone()).or_default().push(job_ref.clone());
    }
  }
  plan
}

pub(crate) struct Reconciler<V: Vcs> {
  pub vcs: Arc<V>,
  pub config: Arc<DispatchConfig>,
}

impl<V: Vcs> Reconciler<V> {
  /// Merge every pushed job ref into the base branch of each touched
  /// sub-repository, then save each requested branch and the base branch.
  ///
  /// Sub-repositories are merged before the top level. Does nothing when no
  /// branch was pushed. The first failing step stops reconciliation; the
  /// summary keeps what was done before it and carries the error.
  pub async fn reconcile(
    &self,
    source: &Path,
    outcomes: &[BranchOutcome],
    branches: &[String],
  ) -> ReconcileSummary {
    let mut summary = ReconcileSummary::default();
    if let Err(e) = self.apply(source, outcomes, branches, &mut summary).await {
      summary.error = Some(e.to_string());
    }
    summary
  }

  async fn apply(
    &self,
    source: &Path,
    outcomes: &[BranchOutcome],
    branches: &[String],
    summary: &mut ReconcileSummary,
  ) -> Result<(), DispatchError> {
    let mut plan: Vec<(String, Vec<String>)> = merge_plan(outcomes).into_iter().collect();
    if plan.is_empty() {
      info!("no pushed branches to reconcile");
      return Ok(());
    }
    plan.sort_by_key(|(sub, _)| sub.is_empty());

    let base = &self.config.base_branch;
    let message = &self.config.save_message;

    for (sub, job_refs) in plan {
      let repo = join_subrepo(source, &sub);
      let _lock = self.lock(&repo).await?;
      self.vcs.checkout(&repo, base, false).await?;
      self.vcs.merge(&repo, &job_refs, message).await?;
      info!(subrepo = %sub, job_refs = job_refs.len(), "merged job refs");
      summary.merges.push(MergeRecord {
        subrepo: sub,
        job_refs,
      });
      self.vcs.save(&repo, message).await?;
    }

    let _lock = self.lock(source).await?;
    for branch in branches.iter().filter(|b| *b != base) {
      self.vcs.checkout(source, branch, false).await?;
      self.vcs.save(source, message).await?;
      summary.saved.push(branch.clone());
    }
    self.vcs.checkout(source, base, false).await?;
    self.vcs.save(source, message).await?;
    summary.saved.push(base.clone());

    Ok(())
  }

  async fn lock(&self, repo: &Path) -> Result<RepoLock, DispatchError> {
    Ok(
      RepoLock::acquire(
        &self.config.lock_dir,
        &repo.to_string_lossy(),
        Duration::from_millis(self.config.lock_timeout_ms),
        Duration::from_millis(self.config.lock_poll_ms),
      )
      .await?,
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::branch::BranchState;

  fn pushed(branch: &str, job_ref: &str, touched: &[&str]) -> BranchOutcome {
    BranchOutcome {
      state: BranchState::Pushed,
      job_ref: Some(job_ref.to_string()),
      touched: touched.iter().map(|s| s.to_string()).collect(),
      ..BranchOutcome::new(branch)
    }
  }

  #[test]
  fn test_merge_plan_groups_by_subrepo() {
    let outcomes = vec![
      pushed("a", "job/a-1", &["", "sub-01"]),
      pushed("b", "job/b-2", &["sub-01"]),
      BranchOutcome::cancelled("c"),
    ];
    let plan = merge_plan(&outcomes);
    assert_eq!(plan.len(), 2);
    assert_eq!(plan[""], vec!["job/a-1"]);
    assert_eq!(plan["sub-01"], vec!["job/a-1", "job/b-2"]);
  }

  #[test]
  fn test_failed_branches_are_not_merged() {
    let mut failed = pushed("a", "job/a-1", &[""]);
    failed.state = BranchState::Failed;
    assert!(merge_plan(&[failed]).is_empty());
  }
}
