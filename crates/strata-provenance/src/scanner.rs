//! History scanning and provenance graph construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use strata_vcs::{Commit, Vcs};
use strata_workflow::{DEFAULT_GROUP, NodeKind, WorkflowGraph, WorkflowNode};
use tracing::{info, instrument, warn};

use crate::error::ProvenanceError;
use crate::record::RunRecord;
use crate::resolve::PathIndex;

/// A run-record with its names resolved to repository-relative paths.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRun {
  pub commit: String,
  pub summary: String,
  pub record: RunRecord,
  pub inputs: Vec<String>,
  pub outputs: Vec<String>,
}

impl ResolvedRun {
  /// Resolve the names of `record` through `index`, prefixing paths with `prefix`.
  pub fn new(commit: &Commit, record: RunRecord, index: &PathIndex, prefix: &str) -> Self {
    let pwd = record.pwd.as_deref();
    let resolve_all = |names: &[String]| -> Vec<String> {
      names
        .iter()
        .map(|name| with_prefix(prefix, &index.resolve(name, pwd)))
        .collect()
    };
    let inputs = resolve_all(&record.inputs);
    let outputs = resolve_all(&record.outputs);
    Self {
      commit: commit.id.clone(),
      summary: commit.summary().to_string(),
      record,
      inputs,
      outputs,
    }
  }
}

fn with_prefix(prefix: &str, path: &str) -> String {
  if prefix.is_empty() {
    path.to_string()
  } else {
    format!("{prefix}/{path}")
  }
}

/// Build the provenance graph of `runs`.
///
/// Each run becomes a task node named by its commit, with edges from its
/// inputs and to its outputs. Runs sharing a path are connected through that
/// file node.
pub fn build_provenance_graph(runs: &[ResolvedRun]) -> Result<WorkflowGraph, ProvenanceError> {
  let mut graph = WorkflowGraph::new();

  for run in runs {
    if graph.contains(&run.commit) {
      continue;
    }
    let group = run.record.workflow.as_deref().unwrap_or(DEFAULT_GROUP);
    let mut task = WorkflowNode::task(&run.commit, &run.record.cmd, group, "");
    task.label = run.summary.clone();
    if let NodeKind::Task { pce, .. } = &mut task.kind {
      *pce = run.record.pce;
    }
    graph.add_node(task)?;

    for input in &run.inputs {
      graph.ensure_node(WorkflowNode::file_at(input));
      graph.add_edge(input, &run.commit)?;
    }
    for output in &run.outputs {
      graph.ensure_node(WorkflowNode::file_at(output));
      graph.add_edge(&run.commit, output)?;
    }
  }

  Ok(graph.with_fingerprints())
}

/// Scans repository history for run-records.
pub struct ProvenanceScanner<V: Vcs> {
  vcs: Arc<V>,
  superdataset: bool,
}

impl<V: Vcs> ProvenanceScanner<V> {
  pub fn new(vcs: Arc<V>) -> Self {
    Self {
      vcs,
      superdataset: false,
    }
  }

  /// Also scan every linked sub-repository.
  pub fn with_superdataset(mut self, superdataset: bool) -> Self {
    self.superdataset = superdataset;
    self
  }

  /// Build the provenance graph of `repo` at `rev`.
  ///
  /// In superdataset mode each sub-repository is scanned at its checked-out
  /// HEAD and its paths are prefixed with its location.
  #[instrument(name = "scan", skip(self, repo), fields(repo = %repo.display()))]
  pub async fn scan(&self, repo: &Path, rev: &str) -> Result<WorkflowGraph, ProvenanceError> {
    if !self.vcs.is_repository(repo).await {
      return Err(ProvenanceError::RepositoryUnavailable {
        path: repo.to_path_buf(),
        message: "not a repository".to_string(),
      });
    }

    let mut runs = self.collect_runs(repo, rev, "").await?;

    if self.superdataset {
      for sub in self.vcs.submodules(repo).await? {
        let location = repo.join(&sub);
        if !self.vcs.is_repository(&location).await {
          warn!(subrepo = %sub.display(), "sub-repository not installed, skipping");
          continue;
        }
        let prefix = sub.to_string_lossy().replace('\\', "/");
        runs.extend(self.collect_runs(&location, "HEAD", &prefix).await?);
      }
    }

    let graph = build_provenance_graph(&runs)?;
    info!(runs = runs.len(), nodes = graph.len(), "scanned provenance");
    Ok(graph)
  }

  async fn collect_runs(
    &self,
    repo: &Path,
    rev: &str,
    prefix: &str,
  ) -> Result<Vec<ResolvedRun>, ProvenanceError> {
    let commits = self.vcs.log(repo, rev).await?;
    let records: Vec<(Commit, RunRecord)> = commits
      .into_iter()
      .filter_map(|commit| match RunRecord::from_commit(&commit) {
        Ok(Some(record)) => Some((commit, record)),
        Ok(None) => None,
        Err(e) => {
          warn!(error = %e, "skipping run-record");
          None
        }
      })
      .collect();

    if records.is_empty() {
      return Ok(Vec::new());
    }

    let root = repo.to_path_buf();
    let index = tokio::task::spawn_blocking(move || PathIndex::build(&root))
      .await
      .map_err(|e| ProvenanceError::IndexFailed {
        path: repo.to_path_buf(),
        message: e.to_string(),
      })?;
    Ok(
      records
        .into_iter()
        .map(|(commit, record)| ResolvedRun::new(&commit, record, &index, prefix))
        .collect(),
    )
  }
}

/// Sub-repositories touched by `paths`: the deepest enclosing one, or `""`
/// for the top-level repository.
pub fn owning_subrepos<'a>(paths: impl IntoIterator<Item = &'a str>, subrepos: &[PathBuf]) -> Vec<String> {
  let subs: Vec<String> = subrepos
    .iter()
    .map(|s| s.to_string_lossy().replace('\\', "/"))
    .collect();

  let mut owners: Vec<String> = paths
    .into_iter()
    .map(|path| {
      subs
        .iter()
        .filter(|sub| path.strip_prefix(sub.as_str()).is_some_and(|rest| rest.starts_with('/')))
        .max_by_key(|sub| sub.len())
        .cloned()
        .unwrap_or_default()
    })
    .collect();
  owners.sort();
  owners.dedup();
  owners
}

#[cfg(test)]
mod tests {
  use super::*;
  use strata_workflow::task_fingerprint;

  fn run(commit: &str, inputs: &[&str], outputs: &[&str], cmd: &str) -> ResolvedRun {
    ResolvedRun {
      commit: commit.to_string(),
      summary: format!("[DATALAD RUNCMD] {cmd}"),
      record: RunRecord {
        cmd: cmd.to_string(),
        inputs: inputs.iter().map(|s| s.to_string()).collect(),
        outputs: outputs.iter().map(|s| s.to_string()).collect(),
        pwd: None,
        exit: Some(0),
        pce: Some(0.5),
        workflow: Some("prep".to_string()),
      },
      inputs: inputs.iter().map(|s| s.to_string()).collect(),
      outputs: outputs.iter().map(|s| s.to_string()).collect(),
    }
  }

  #[test]
  fn test_runs_chain_through_shared_files() {
    let graph = build_provenance_graph(&[
      run("c1", &["raw/a.txt"], &["mid/a.txt"], "clean"),
      run("c2", &["mid/a.txt"], &["out/a.txt"], "fit"),
    ])
    .unwrap();

    assert_eq!(graph.len(), 5);
    assert_eq!(graph.successors("mid/a.txt"), vec!["c2"]);
    assert_eq!(graph.predecessors("mid/a.txt"), vec!["c1"]);
  }

  #[test]
  fn test_task_node_carries_record_metadata() {
    let graph = build_provenance_graph(&[run("c1", &["raw/a.txt"], &["out/a.txt"], "sort")]).unwrap();
    let task = graph.get_node("c1").unwrap();

    assert_eq!(task.label, "[DATALAD RUNCMD] sort");
    assert_eq!(task.group, "prep");
    assert!(matches!(task.kind, NodeKind::Task { pce: Some(p), .. } if p == 0.5));
    assert_eq!(
      task.fingerprint,
      task_fingerprint(&["out/a.txt", "raw/a.txt"], "sort")
    );
    assert_eq!(graph.get_node("out/a.txt").unwrap().label, "a.txt");
  }

  #[test]
  fn test_no_runs_is_empty_graph() {
    assert!(build_provenance_graph(&[]).unwrap().is_empty());
  }

  #[test]
  fn test_resolved_run_applies_prefix() {
    let index = PathIndex::from_paths(["raw/a.txt"]);
    let record = run("c1", &["a.txt"], &["new.txt"], "x").record;
    let resolved = ResolvedRun::new(&Commit::new("c1", "summary\nbody"), record, &index, "sub-01");

    assert_eq!(resolved.inputs, vec!["sub-01/raw/a.txt"]);
    assert_eq!(resolved.outputs, vec!["sub-01/new.txt"]);
    assert_eq!(resolved.summary, "summary");
  }

  #[test]
  fn test_owning_subrepos() {
    let subs = vec![PathBuf::from("sub-01"), PathBuf::from("sub-01/deriv")];
    let owners = owning_subrepos(
      ["sub-01/deriv/x.nii", "sub-01/y.nii", "top.txt", "sub-012/z"],
      &subs,
    );
    assert_eq!(owners, vec!["", "sub-01", "sub-01/deriv"]);
  }
}
