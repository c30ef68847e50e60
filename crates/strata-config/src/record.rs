//! Workflow specification records.
//!
//! One record per line, fields separated by [`SEPARATOR`]:
//!
//! ```text
//! F<>names<>predecessors
//! T<>name<>predecessors<>command<>workflow-group[<>output-template]
//! ```
//!
//! Name and predecessor fields are comma-separated lists of handles and may
//! use `{A..B}` ranges. Blank lines and lines starting with `#` are skipped.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SpecError;
use crate::expand::{expand_handle, expand_list};

/// Field separator; not expected in file names or commands.
pub const SEPARATOR: &str = "<>";

const FILE_FIELDS: &str = "3";
const TASK_FIELDS: &str = "5 or 6";

/// A file record: one or more file names sharing a predecessor list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
  pub names: Vec<String>,
  pub predecessors: Vec<String>,
}

/// A task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
  pub name: String,
  pub predecessors: Vec<String>,
  pub command: String,
  pub group: String,
  #[serde(default)]
  pub output_template: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
  File(FileRecord),
  Task(TaskRecord),
}

/// A record with the 1-based line it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecRecord {
  pub line: usize,
  pub record: Record,
}

/// A parsed workflow specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSpec {
  pub records: Vec<SpecRecord>,
}

impl WorkflowSpec {
  /// Parse a specification; the first malformed line aborts the parse.
  pub fn parse(text: &str) -> Result<Self, SpecError> {
    let mut records = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
      let line = idx + 1;
      let trimmed = raw.trim();
      if trimmed.is_empty() || trimmed.starts_with('#') {
        continue;
      }
      records.push(SpecRecord {
        line,
        record: parse_record(line, trimmed)?,
      });
    }
    Ok(Self { records })
  }

  /// Build a specification from records, numbering them from line 1.
  pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
    Self {
      records: records
        .into_iter()
        .enumerate()
        .map(|(idx, record)| SpecRecord {
          line: idx + 1,
          record,
        })
        .collect(),
    }
  }

  /// Render the specification in its line-oriented text form.
  pub fn to_text(&self) -> String {
    let mut out = String::new();
    for rec in &self.records {
      out.push_str(&rec.record.to_string());
      out.push('\n');
    }
    out
  }
}

impl FromStr for WorkflowSpec {
  type Err = SpecError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

fn malformed(line: usize, expected: &'static str, message: impl Into<String>) -> SpecError {
  SpecError::MalformedRecord {
    line,
    message: message.into(),
    expected,
  }
}

fn parse_record(line: usize, text: &str) -> Result<Record, SpecError> {
  let fields: Vec<&str> = text.split(SEPARATOR).map(str::trim).collect();

  match fields[0] {
    "F" => {
      if fields.len() != 3 {
        return Err(malformed(
          line,
          FILE_FIELDS,
          format!("file record has {} fields", fields.len()),
        ));
      }
      let names = expand_list(fields[1]).map_err(|e| malformed(line, FILE_FIELDS, e.to_string()))?;
      if names.is_empty() {
        return Err(malformed(line, FILE_FIELDS, "file record names no files"));
      }
      let predecessors =
        expand_list(fields[2]).map_err(|e| malformed(line, FILE_FIELDS, e.to_string()))?;
      Ok(Record::File(FileRecord {
        names,
        predecessors,
      }))
    }
    "T" => {
      if fields.len() != 5 && fields.len() != 6 {
        return Err(malformed(
          line,
          TASK_FIELDS,
          format!("task record has {} fields", fields.len()),
        ));
      }
      let mut names =
        expand_handle(fields[1]).map_err(|e| malformed(line, TASK_FIELDS, e.to_string()))?;
      if names.len() != 1 || names[0].is_empty() {
        return Err(malformed(
          line,
          TASK_FIELDS,
          "task record must name exactly one task",
        ));
      }
      let predecessors =
        expand_list(fields[2]).map_err(|e| malformed(line, TASK_FIELDS, e.to_string()))?;
      if fields[3].is_empty() {
        return Err(malformed(line, TASK_FIELDS, "task record has an empty command"));
      }
      Ok(Record::Task(TaskRecord {
        name: names.remove(0),
        predecessors,
        command: fields[3].to_string(),
        group: fields[4].to_string(),
        output_template: fields.get(5).map(|s| s.to_string()).unwrap_or_default(),
      }))
    }
    other => Err(malformed(
      line,
      "3 (F) or 5-6 (T)",
      format!("unknown record type '{}'", other),
    )),
  }
}

impl fmt::Display for Record {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Record::File(rec) => write!(
        f,
        "F{sep}{}{sep}{}",
        rec.names.join(","),
        rec.predecessors.join(","),
        sep = SEPARATOR
      ),
      Record::Task(rec) => {
        write!(
          f,
          "T{sep}{}{sep}{}{sep}{}{sep}{}",
          rec.name,
          rec.predecessors.join(","),
          rec.command,
          rec.group,
          sep = SEPARATOR
        )?;
        if !rec.output_template.is_empty() {
          write!(f, "{}{}", SEPARATOR, rec.output_template)?;
        }
        Ok(())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SPEC: &str = "\
# inputs
F<>in{1..2}<>
T<>t1<>in1,in2<>cat * > merged<>main<>merged_*
F<>merged<>t1

T<>t2<>merged<>wc -l merged<>stats
";

  #[test]
  fn test_parses_file_and_task_records() {
    let spec = WorkflowSpec::parse(SPEC).unwrap();
    assert_eq!(spec.records.len(), 4);

    assert_eq!(spec.records[0].line, 2);
    assert_eq!(
      spec.records[0].record,
      Record::File(FileRecord {
        names: vec!["in1".into(), "in2".into()],
        predecessors: vec![],
      })
    );

    match &spec.records[1].record {
      Record::Task(t) => {
        assert_eq!(t.name, "t1");
        assert_eq!(t.predecessors, vec!["in1", "in2"]);
        assert_eq!(t.command, "cat * > merged");
        assert_eq!(t.group, "main");
        assert_eq!(t.output_template, "merged_*");
      }
      other => panic!("expected task record, got {:?}", other),
    }

    match &spec.records[3].record {
      Record::Task(t) => {
        assert_eq!(t.group, "stats");
        assert!(t.output_template.is_empty());
      }
      other => panic!("expected task record, got {:?}", other),
    }
  }

  #[test]
  fn test_missing_fields_report_line_and_count() {
    let err = WorkflowSpec::parse("F<>a<>\nT<>t1<>a<>echo\n").unwrap_err();
    match err {
      SpecError::MalformedRecord { line, expected, .. } => {
        assert_eq!(line, 2);
        assert_eq!(expected, "5 or 6");
      }
      other => panic!("unexpected error: {:?}", other),
    }

    let err = WorkflowSpec::parse("F<>a\n").unwrap_err();
    assert!(matches!(
      err,
      SpecError::MalformedRecord {
        line: 1,
        expected: "3",
        ..
      }
    ));
  }

  #[test]
  fn test_bad_range_is_malformed() {
    let err = WorkflowSpec::parse("F<>file{3..1}.png<>\n").unwrap_err();
    assert!(matches!(err, SpecError::MalformedRecord { line: 1, .. }));
  }

  #[test]
  fn test_unknown_record_type() {
    let err = WorkflowSpec::parse("X<>a<>b\n").unwrap_err();
    assert!(matches!(err, SpecError::MalformedRecord { line: 1, .. }));
  }

  #[test]
  fn test_task_name_range_rejected() {
    let err = WorkflowSpec::parse("T<>t{1..2}<><>echo<>main\n").unwrap_err();
    assert!(matches!(err, SpecError::MalformedRecord { line: 1, .. }));
  }

  #[test]
  fn test_text_form_reparses_identically() {
    let spec = WorkflowSpec::parse(SPEC).unwrap();
    let text = spec.to_text();
    let again = WorkflowSpec::parse(&text).unwrap();
    let records = |s: &WorkflowSpec| s.records.iter().map(|r| r.record.clone()).collect::<Vec<_>>();
    assert_eq!(records(&spec), records(&again));
    assert!(text.starts_with("F<>in1,in2<>\n"));
    assert!(text.contains("T<>t2<>merged<>wc -l merged<>stats\n"));
  }

  #[test]
  fn test_from_str() {
    let spec: WorkflowSpec = "F<>a<>".parse().unwrap();
    assert_eq!(spec.records.len(), 1);
  }
}
