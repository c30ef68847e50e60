use std::path::Path;

use serde::{Deserialize, Serialize};

/// Workflow group assigned when a record does not name one.
pub const DEFAULT_GROUP: &str = "main";

/// Execution status of a node relative to the provenance ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
  #[default]
  Pending,
  Complete,
}

/// Kind-specific node data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
  /// A file produced or consumed by tasks.
  File {
    /// Directory component of the file, empty when the name is not yet resolved.
    #[serde(default)]
    dir: String,
  },
  /// A command that turns its predecessor files into its successor files.
  Task {
    command: String,
    /// Output-name pattern with a `*` placeholder; empty when unused.
    #[serde(default)]
    output_template: String,
    /// Provenance-completeness estimate carried by a run-record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pce: Option<f64>,
  },
}

/// A node of a workflow graph.
///
/// `name` is the identity inside the owning graph; `label` is the
/// materialized display name and starts out equal to the name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
  pub name: String,
  pub label: String,
  #[serde(flatten)]
  pub kind: NodeKind,
  #[serde(default)]
  pub status: NodeStatus,
  #[serde(default)]
  pub fingerprint: String,
  pub group: String,
}

impl WorkflowNode {
  /// A file node whose label is its name.
  pub fn file(name: impl Into<String>) -> Self {
    let name = name.into();
    Self {
      label: name.clone(),
      name,
      kind: NodeKind::File { dir: String::new() },
      status: NodeStatus::Pending,
      fingerprint: String::new(),
      group: DEFAULT_GROUP.to_string(),
    }
  }

  /// A file node for a repository-relative path, split into directory and label.
  pub fn file_at(path: &str) -> Self {
    let (dir, label) = split_path(path);
    Self {
      name: path.to_string(),
      label,
      kind: NodeKind::File { dir },
      status: NodeStatus::Pending,
      fingerprint: String::new(),
      group: DEFAULT_GROUP.to_string(),
    }
  }

  /// A task node.
  pub fn task(
    name: impl Into<String>,
    command: impl Into<String>,
    group: impl Into<String>,
    output_template: impl Into<String>,
  ) -> Self {
    let name = name.into();
    Self {
      label: name.clone(),
      name,
      kind: NodeKind::Task {
        command: command.into(),
        output_template: output_template.into(),
        pce: None,
      },
      status: NodeStatus::Pending,
      fingerprint: String::new(),
      group: group.into(),
    }
  }

  pub fn is_task(&self) -> bool {
    matches!(self.kind, NodeKind::Task { .. })
  }

  pub fn is_file(&self) -> bool {
    matches!(self.kind, NodeKind::File { .. })
  }

  pub fn is_complete(&self) -> bool {
    self.status == NodeStatus::Complete
  }

  /// Task command, `None` for file nodes.
  pub fn command(&self) -> Option<&str> {
    match &self.kind {
      NodeKind::Task { command, .. } => Some(command),
      NodeKind::File { .. } => None,
    }
  }

  /// Output template of a task; empty for files and tasks without one.
  pub fn output_template(&self) -> &str {
    match &self.kind {
      NodeKind::Task {
        output_template, ..
      } => output_template,
      NodeKind::File { .. } => "",
    }
  }

  /// Path of a file node: its directory joined with its label.
  ///
  /// Returns `None` for task nodes.
  pub fn file_path(&self) -> Option<String> {
    match &self.kind {
      NodeKind::File { dir } if dir.is_empty() => Some(self.label.clone()),
      NodeKind::File { dir } => Some(format!("{}/{}", dir.trim_end_matches('/'), self.label)),
      NodeKind::Task { .. } => None,
    }
  }

  /// Display color derived from kind and status.
  ///
  /// Purely presentational; status is the authoritative field.
  pub fn color(&self) -> &'static str {
    match (&self.kind, self.status) {
      (NodeKind::File { .. }, NodeStatus::Pending) => "lightblue",
      (NodeKind::File { .. }, NodeStatus::Complete) => "steelblue",
      (NodeKind::Task { .. }, NodeStatus::Pending) => "orange",
      (NodeKind::Task { .. }, NodeStatus::Complete) => "green",
    }
  }

  /// Copy of this node with a new label.
  pub fn with_label(&self, label: impl Into<String>) -> Self {
    Self {
      label: label.into(),
      ..self.clone()
    }
  }

  /// Copy of this node with a new status.
  pub fn with_status(&self, status: NodeStatus) -> Self {
    Self {
      status,
      ..self.clone()
    }
  }

  /// Copy of this node with a new fingerprint.
  pub fn with_fingerprint(&self, fingerprint: impl Into<String>) -> Self {
    Self {
      fingerprint: fingerprint.into(),
      ..self.clone()
    }
  }
}

/// Split a slash-separated path into (directory, file name).
fn split_path(path: &str) -> (String, String) {
  let p = Path::new(path);
  let label = p
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| path.to_string());
  let dir = p
    .parent()
    .map(|d| d.to_string_lossy().into_owned())
    .unwrap_or_default();
  (dir, label)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_file_at_splits_directory() {
    let node = WorkflowNode::file_at("derivatives/sub-01/out.nii");
    assert_eq!(node.name, "derivatives/sub-01/out.nii");
    assert_eq!(node.label, "out.nii");
    assert_eq!(node.kind, NodeKind::File {
      dir: "derivatives/sub-01".to_string()
    });
    assert_eq!(node.file_path().as_deref(), Some("derivatives/sub-01/out.nii"));
  }

  #[test]
  fn test_file_path_uses_label() {
    let node = WorkflowNode::file("out1").with_label("out_in1");
    assert_eq!(node.file_path().as_deref(), Some("out_in1"));
  }

  #[test]
  fn test_task_accessors() {
    let task = WorkflowNode::task("t1", "echo *", "main", "out_*");
    assert!(task.is_task());
    assert_eq!(task.command(), Some("echo *"));
    assert_eq!(task.output_template(), "out_*");
    assert_eq!(task.file_path(), None);
  }

  #[test]
  fn test_color_follows_status() {
    let task = WorkflowNode::task("t1", "echo", "main", "");
    assert_eq!(task.color(), "orange");
    assert_eq!(task.with_status(NodeStatus::Complete).color(), "green");
  }

  #[test]
  fn test_serde_tags_kind() {
    let node = WorkflowNode::file("a.txt");
    let json = serde_json::to_value(&node).unwrap();
    assert_eq!(json["kind"], "file");
    assert_eq!(json["status"], "pending");
    let back: WorkflowNode = serde_json::from_value(json).unwrap();
    assert_eq!(back, node);
  }
}
