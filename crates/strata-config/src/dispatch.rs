use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SpecError;

/// Configuration for dispatching pending work and reconciling results.
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
  /// Remote used to push job refs back to the source repository.
  pub remote: String,
  /// Branch that receives the merge of all job refs.
  pub base_branch: String,
  /// Prefix of the per-branch job refs.
  pub job_ref_prefix: String,
  /// Maximum number of branches worked on at once.
  pub max_workers: usize,
  /// Directory under which ephemeral clones are created.
  pub clone_root: PathBuf,
  /// Directory holding repository lock files.
  pub lock_dir: PathBuf,
  /// Give up waiting for a repository lock after this long.
  pub lock_timeout_ms: u64,
  /// Interval between lock acquisition attempts.
  pub lock_poll_ms: u64,
  /// Substrings in run output that mark the run as failed.
  pub error_markers: Vec<String>,
  /// Scan every linked sub-repository instead of only the top-level one.
  pub superdataset: bool,
  /// Commit message used when saving reconciled branches.
  pub save_message: String,
}

impl Default for DispatchConfig {
  fn default() -> Self {
    let scratch = std::env::temp_dir();
    Self {
      remote: "origin".to_string(),
      base_branch: "master".to_string(),
      job_ref_prefix: "job/".to_string(),
      max_workers: default_workers(),
      clone_root: scratch.join("strata-clones"),
      lock_dir: scratch.join("strata-locks"),
      lock_timeout_ms: 600_000,
      lock_poll_ms: 200,
      error_markers: vec!["run(error)".to_string(), "[ERROR]".to_string()],
      superdataset: false,
      save_message: "strata: reconcile dispatched branches".to_string(),
    }
  }
}

impl DispatchConfig {
  /// Defaults with lock files kept under `data_dir`.
  pub fn with_data_dir(data_dir: &Path) -> Self {
    Self {
      lock_dir: data_dir.join("locks"),
      ..Self::default()
    }
  }

  /// Parse a JSON config; missing fields take their defaults.
  pub fn from_json(text: &str) -> Result<Self, SpecError> {
    Ok(serde_json::from_str(text)?)
  }

  /// Load a JSON config file.
  pub fn load(path: &Path) -> Result<Self, SpecError> {
    let text = std::fs::read_to_string(path)?;
    Self::from_json(&text)
  }

  /// Job ref for `branch`, made unique by `suffix`.
  pub fn job_ref(&self, branch: &str, suffix: &str) -> String {
    format!("{}{}-{}", self.job_ref_prefix, branch.replace('/', "-"), suffix)
  }
}

fn default_workers() -> usize {
  std::thread::available_parallelism()
    .map(|n| n.get())
    .unwrap_or(1)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_object_gives_defaults() {
    let config = DispatchConfig::from_json("{}").unwrap();
    assert_eq!(config, DispatchConfig::default());
    assert!(config.max_workers >= 1);
    assert_eq!(config.remote, "origin");
  }

  #[test]
  fn test_partial_override() {
    let config =
      DispatchConfig::from_json(r#"{"base_branch": "main", "lock_timeout_ms": 50}"#).unwrap();
    assert_eq!(config.base_branch, "main");
    assert_eq!(config.lock_timeout_ms, 50);
    assert_eq!(config.job_ref_prefix, "job/");
  }

  #[test]
  fn test_unknown_json_is_error() {
    assert!(matches!(
      DispatchConfig::from_json("not json"),
      Err(SpecError::Config(_))
    ));
  }

  #[test]
  fn test_job_ref_flattens_branch_name() {
    let config = DispatchConfig::default();
    assert_eq!(config.job_ref("feature/a", "1f2e"), "job/feature-a-1f2e");
  }

  #[test]
  fn test_data_dir_moves_locks() {
    let config = DispatchConfig::with_data_dir(Path::new("/var/strata"));
    assert_eq!(config.lock_dir, PathBuf::from("/var/strata/locks"));
  }
}
