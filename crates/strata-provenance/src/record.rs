//! Run-records embedded in commit messages.
//!
//! A run-record commit message looks like:
//!
//! ```text
//! [DATALAD RUNCMD] summary
//!
//! === Do not change lines below ===
//! {
//!  "cmd": "sort raw/a.txt > out/a.txt",
//!  "inputs": ["raw/a.txt"],
//!  "outputs": ["out/a.txt"],
//!  ...
//! }
//! ^^^ Do not change lines above ^^^
//! ```

use serde::{Deserialize, Serialize};
use strata_vcs::Commit;

use crate::error::ProvenanceError;

/// Substring identifying a run-record commit.
pub const RUN_MARKER: &str = "[DATALAD RUNCMD]";

const PAYLOAD_BEGIN: &str = "=== Do not change lines below ===";
const PAYLOAD_END: &str = "^^^ Do not change lines above ^^^";

/// Structured payload of one recorded run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
  pub cmd: String,
  #[serde(default)]
  pub inputs: Vec<String>,
  #[serde(default)]
  pub outputs: Vec<String>,
  /// Working directory relative to the repository root.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pwd: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exit: Option<i32>,
  /// Provenance-completeness estimate.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pce: Option<f64>,
  /// Sub-workflow tag.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub workflow: Option<String>,
}

impl RunRecord {
  /// Extract the run-record from a commit.
  ///
  /// Commits without the marker yield `Ok(None)`.
  pub fn from_commit(commit: &Commit) -> Result<Option<Self>, ProvenanceError> {
    if !commit.message.contains(RUN_MARKER) {
      return Ok(None);
    }

    let malformed = |message: String| ProvenanceError::MalformedRunRecord {
      commit: commit.id.clone(),
      message,
    };

    let payload = extract_payload(&commit.message)
      .ok_or_else(|| malformed("payload delimiters not found".to_string()))?;
    let record: RunRecord =
      serde_json::from_str(payload).map_err(|e| malformed(e.to_string()))?;
    Ok(Some(record))
  }

  /// Render the record as a commit message with `summary` as its first line.
  pub fn to_message(&self, summary: &str) -> Result<String, serde_json::Error> {
    let payload = serde_json::to_string_pretty(self)?;
    Ok(format!(
      "{RUN_MARKER} {summary}\n\n{PAYLOAD_BEGIN}\n{payload}\n{PAYLOAD_END}\n"
    ))
  }

  /// Whether the recorded command exited with a non-zero status.
  pub fn failed(&self) -> bool {
    self.exit.is_some_and(|code| code != 0)
  }
}

fn extract_payload(message: &str) -> Option<&str> {
  let start = message.find(PAYLOAD_BEGIN)? + PAYLOAD_BEGIN.len();
  let len = message[start..].find(PAYLOAD_END)?;
  Some(message[start..start + len].trim())
}
