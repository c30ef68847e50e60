use std::path::PathBuf;

/// Invocation of the substrate's recorded-run primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
  /// Repository in which the run is recorded.
  pub repo: PathBuf,
  /// Commit message for the run-record.
  pub message: String,
  /// Repository-relative input paths.
  pub inputs: Vec<String>,
  /// Repository-relative output paths.
  pub outputs: Vec<String>,
  /// Shell command to execute.
  pub command: String,
}

/// Captured output of a recorded run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
  pub stdout: String,
  pub stderr: String,
  pub success: bool,
  pub exit_code: Option<i32>,
}

impl RunOutput {
  /// First of `markers` found in stdout or stderr.
  pub fn error_marker<'a>(&self, markers: &'a [String]) -> Option<&'a str> {
    markers
      .iter()
      .filter(|m| !m.is_empty())
      .find(|m| self.stdout.contains(m.as_str()) || self.stderr.contains(m.as_str()))
      .map(|m| m.as_str())
  }

  /// Why the run counts as failed, if it does.
  ///
  /// An error marker in the output wins over the exit status.
  pub fn failure(&self, markers: &[String]) -> Option<String> {
    if let Some(marker) = self.error_marker(markers) {
      return Some(marker.to_string());
    }
    if self.success {
      return None;
    }
    Some(match self.exit_code {
      Some(code) => format!("exit status {code}"),
      None => "terminated by signal".to_string(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn markers() -> Vec<String> {
    vec!["run(error)".to_string(), "[ERROR]".to_string()]
  }

  #[test]
  fn test_marker_in_either_stream() {
    let out = RunOutput {
      stdout: "run(ok): /ds (dataset)\nrun(error): /ds (dataset)".to_string(),
      success: true,
      ..Default::default()
    };
    assert_eq!(out.error_marker(&markers()), Some("run(error)"));

    let out = RunOutput {
      stderr: "[ERROR] command failed".to_string(),
      success: true,
      ..Default::default()
    };
    assert_eq!(out.failure(&markers()).as_deref(), Some("[ERROR]"));
  }

  #[test]
  fn test_clean_success_is_not_failure() {
    let out = RunOutput {
      stdout: "run(ok): /ds (dataset)".to_string(),
      success: true,
      exit_code: Some(0),
      ..Default::default()
    };
    assert_eq!(out.failure(&markers()), None);
  }

  #[test]
  fn test_nonzero_exit_without_marker() {
    let out = RunOutput {
      success: false,
      exit_code: Some(2),
      ..Default::default()
    };
    assert_eq!(out.failure(&markers()).as_deref(), Some("exit status 2"));
  }

  #[test]
  fn test_empty_marker_ignored() {
    let out = RunOutput {
      stdout: "fine".to_string(),
      success: true,
      ..Default::default()
    };
    assert_eq!(out.error_marker(&[String::new()]), None);
  }
}
