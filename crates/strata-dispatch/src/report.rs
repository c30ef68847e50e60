use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::branch::BranchOutcome;
use crate::reconcile::ReconcileSummary;

/// Outcome of a whole dispatch: every branch plus reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
  pub dispatch_id: String,
  pub started_at: DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  /// One entry per requested branch, in request order.
  pub branches: Vec<BranchOutcome>,
  pub reconcile: ReconcileSummary,
}

impl DispatchReport {
  pub fn succeeded(&self) -> impl Iterator<Item = &BranchOutcome> {
    self.branches.iter().filter(|b| !b.is_failed())
  }

  pub fn failed(&self) -> impl Iterator<Item = &BranchOutcome> {
    self.branches.iter().filter(|b| b.is_failed())
  }

  /// True when no branch failed and reconciliation completed.
  pub fn is_clean(&self) -> bool {
    self.failed().next().is_none() && self.reconcile.error.is_none()
  }

  pub fn to_json(&self) -> serde_json::Result<String> {
    serde_json::to_string_pretty(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::branch::BranchState;

  #[test]
  fn test_report_partitions_branches() {
    let now = Utc::now();
    let mut ok = BranchOutcome::new("a");
    ok.state = BranchState::Pushed;
    let report = DispatchReport {
      dispatch_id: "d".to_string(),
      started_at: now,
      finished_at: now,
      branches: vec![ok, BranchOutcome::cancelled("b")],
      reconcile: ReconcileSummary::default(),
    };

    assert_eq!(report.succeeded().count(), 1);
    assert_eq!(report.failed().next().unwrap().branch, "b");
    assert!(!report.is_clean());

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["branches"][0]["state"], "pushed");
    assert_eq!(json["branches"][1]["state"], "cancelled");
  }
}
