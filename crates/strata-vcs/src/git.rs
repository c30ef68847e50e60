//! Process-backed substrate: `git` for history and refs, `datalad` for
//! cloning, data retrieval, recorded runs and saves.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::VcsError;
use crate::run::{RunOutput, RunRequest};
use crate::{Commit, Vcs};

const RECORD_SEP: char = '\u{1e}';
const FIELD_SEP: char = '\u{1f}';

/// Substrate implementation that shells out to `git` and `datalad`.
#[derive(Debug, Clone)]
pub struct GitVcs {
  git: String,
  datalad: String,
}

impl Default for GitVcs {
  fn default() -> Self {
    Self {
      git: "git".to_string(),
      datalad: "datalad".to_string(),
    }
  }
}

impl GitVcs {
  pub fn new() -> Self {
    Self::default()
  }

  /// Use other executables, e.g. absolute paths or wrappers.
  pub fn with_programs(git: impl Into<String>, datalad: impl Into<String>) -> Self {
    Self {
      git: git.into(),
      datalad: datalad.into(),
    }
  }

  async fn output(&self, program: &str, repo: &Path, args: &[&str]) -> Result<Output, VcsError> {
    debug!(program, repo = %repo.display(), args = ?args, "running substrate command");
    Command::new(program)
      .current_dir(repo)
      .args(args)
      .output()
      .await
      .map_err(|source| VcsError::Spawn {
        program: program.to_string(),
        source,
      })
  }

  /// Run a command and fail on a non-zero exit; returns stdout.
  async fn exec(&self, program: &str, repo: &Path, args: &[&str]) -> Result<String, VcsError> {
    let output = self.output(program, repo, args).await?;
    if !output.status.success() {
      return Err(VcsError::CommandFailed {
        program: program.to_string(),
        args: args.join(" "),
        repo: repo.to_path_buf(),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }

  async fn git(&self, repo: &Path, args: &[&str]) -> Result<String, VcsError> {
    self.exec(&self.git, repo, args).await
  }

  async fn datalad(&self, repo: &Path, args: &[&str]) -> Result<String, VcsError> {
    self.exec(&self.datalad, repo, args).await
  }
}

#[async_trait]
impl Vcs for GitVcs {
  async fn is_repository(&self, path: &Path) -> bool {
    path.is_dir()
      && self
        .output(&self.git, path, &["rev-parse", "--git-dir"])
        .await
        .is_ok_and(|o| o.status.success())
  }

  async fn log(&self, repo: &Path, rev: &str) -> Result<Vec<Commit>, VcsError> {
    let format = format!("--format=%H{FIELD_SEP}%B{RECORD_SEP}");
    let stdout = self.git(repo, &["log", format.as_str(), rev, "--"]).await?;
    Ok(parse_log(&stdout))
  }

  async fn submodules(&self, repo: &Path) -> Result<Vec<PathBuf>, VcsError> {
    let stdout = self.git(repo, &["submodule", "status", "--recursive"]).await?;
    Ok(parse_submodule_status(&stdout))
  }

  async fn clone_repo(&self, source: &str, dest: &Path, branch: &str) -> Result<(), VcsError> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await?;
    let dest_arg = dest.to_string_lossy();
    self.datalad(parent, &["clone", source, dest_arg.as_ref()]).await?;
    self.git(dest, &["checkout", branch]).await?;
    Ok(())
  }

  async fn get_metadata(&self, repo: &Path) -> Result<(), VcsError> {
    self.datalad(repo, &["get", "-n", "-r", "."]).await?;
    Ok(())
  }

  async fn mark_dead(&self, repo: &Path) -> Result<(), VcsError> {
    self.git(repo, &["annex", "dead", "here"]).await?;
    Ok(())
  }

  async fn checkout(&self, repo: &Path, branch: &str, create: bool) -> Result<(), VcsError> {
    let args: &[&str] = if create {
      &["checkout", "-B", branch]
    } else {
      &["checkout", branch]
    };
    self.git(repo, args).await?;
    Ok(())
  }

  async fn run(&self, request: &RunRequest) -> Result<RunOutput, VcsError> {
    let mut args: Vec<&str> = vec!["run", "-m", request.message.as_str()];
    for input in &request.inputs {
      args.extend(["--input", input.as_str()]);
    }
    for output in &request.outputs {
      args.extend(["--output", output.as_str()]);
    }
    args.extend(["--", request.command.as_str()]);

    let output = self.output(&self.datalad, &request.repo, &args).await?;
    Ok(RunOutput {
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
      success: output.status.success(),
      exit_code: output.status.code(),
    })
  }

  async fn push(&self, repo: &Path, remote: &str, refname: &str) -> Result<(), VcsError> {
    self.git(repo, &["push", remote, refname]).await?;
    Ok(())
  }

  async fn merge(&self, repo: &Path, refs: &[String], message: &str) -> Result<(), VcsError> {
    let mut args: Vec<&str> = vec!["merge", "--no-edit", "-m", message];
    args.extend(refs.iter().map(String::as_str));
    self.git(repo, &args).await?;
    Ok(())
  }

  async fn save(&self, repo: &Path, message: &str) -> Result<(), VcsError> {
    self.datalad(repo, &["save", "-m", message]).await?;
    Ok(())
  }
}

/// Parse `git log` output written with record and field separators.
fn parse_log(stdout: &str) -> Vec<Commit> {
  stdout
    .split(RECORD_SEP)
    .filter_map(|record| {
      let (id, message) = record.trim_start().split_once(FIELD_SEP)?;
      Some(Commit {
        id: id.trim().to_string(),
        message: message.trim_end().to_string(),
      })
    })
    .collect()
}

/// Parse `git submodule status` lines: `<flag><sha> <path> [(<describe>)]`.
fn parse_submodule_status(stdout: &str) -> Vec<PathBuf> {
  stdout
    .lines()
    .filter_map(|line| {
      let rest = line.get(1..)?;
      rest.split_whitespace().nth(1).map(PathBuf::from)
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_log_keeps_multiline_messages() {
    let raw = format!(
      "abc{FIELD_SEP}first line\n\nbody{RECORD_SEP}\ndef{FIELD_SEP}second\n{RECORD_SEP}\n"
    );
    let commits = parse_log(&raw);
    assert_eq!(commits.len(), 2);
    assert_eq!(commits[0].id, "abc");
    assert_eq!(commits[0].message, "first line\n\nbody");
    assert_eq!(commits[1].id, "def");
    assert_eq!(commits[1].message, "second");
  }

  #[test]
  fn test_parse_log_empty() {
    assert!(parse_log("").is_empty());
  }

  #[test]
  fn test_parse_submodule_status() {
    let raw = " 1a2b3c sub-01 (heads/master)\n-4d5e6f derivatives/fmriprep\n+7a8b9c code (v1.0-1-g7a8b9c)\n";
    assert_eq!(
      parse_submodule_status(raw),
      vec![
        PathBuf::from("sub-01"),
        PathBuf::from("derivatives/fmriprep"),
        PathBuf::from("code"),
      ]
    );
  }

  #[tokio::test]
  async fn test_plain_directory_is_not_repository() {
    let dir = tempfile::tempdir().unwrap();
    let vcs = GitVcs::new();
    assert!(!vcs.is_repository(&dir.path().join("missing")).await);
  }
}
