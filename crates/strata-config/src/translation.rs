//! Translation tables.
//!
//! A translation table maps abstract handles used in a workflow specification
//! to repository-relative paths. The file is row-oriented with two columns,
//! `handle,path`; `.tsv` files are tab-separated. Lines starting with `#` are
//! comments.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SpecError;

/// Mapping from abstract handle to concrete path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationTable {
  entries: HashMap<String, String>,
}

impl TranslationTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Read a comma-separated table.
  pub fn from_reader<R: Read>(reader: R) -> Result<Self, SpecError> {
    Self::from_reader_with_delimiter(reader, b',')
  }

  /// Read a table with the given column delimiter.
  ///
  /// Comment and blank lines are dropped before parsing, so each row maps to
  /// one file line and errors carry that line number. Quoted fields cannot
  /// span lines.
  pub fn from_reader_with_delimiter<R: Read>(mut reader: R, delimiter: u8) -> Result<Self, SpecError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let mut lines = Vec::new();
    let mut rows = String::with_capacity(text.len());
    for (idx, line) in text.lines().enumerate() {
      let trimmed = line.trim();
      if trimmed.is_empty() || trimmed.starts_with('#') {
        continue;
      }
      lines.push(idx + 1);
      rows.push_str(line);
      rows.push('\n');
    }

    let mut rdr = csv::ReaderBuilder::new()
      .has_headers(false)
      .flexible(true)
      .delimiter(delimiter)
      .trim(csv::Trim::All)
      .from_reader(rows.as_bytes());

    let mut table = Self::new();
    for (row, line) in rdr.records().zip(lines) {
      let row = row?;
      if row.len() != 2 || row[0].is_empty() || row[1].is_empty() {
        return Err(SpecError::MalformedRow {
          line,
          message: format!("expected 2 non-empty columns, found {}", row.len()),
        });
      }
      table.insert_row(line, &row[0], &row[1])?;
    }
    Ok(table)
  }

  /// Load a table from disk; `.tsv` files are read tab-separated.
  pub fn load(path: &Path) -> Result<Self, SpecError> {
    let file = std::fs::File::open(path)?;
    let delimiter = match path.extension().and_then(|e| e.to_str()) {
      Some("tsv") => b'\t',
      _ => b',',
    };
    Self::from_reader_with_delimiter(file, delimiter)
  }

  fn insert_row(&mut self, line: usize, handle: &str, path: &str) -> Result<(), SpecError> {
    if self.entries.contains_key(handle) {
      return Err(SpecError::DuplicateHandle {
        handle: handle.to_string(),
        line,
      });
    }
    self
      .entries
      .insert(handle.to_string(), path.trim_start_matches("./").to_string());
    Ok(())
  }

  /// Add or replace a mapping.
  pub fn insert(&mut self, handle: impl Into<String>, path: impl Into<String>) {
    self.entries.insert(handle.into(), path.into());
  }

  /// Resolve a handle to its path.
  pub fn get(&self, handle: &str) -> Option<&str> {
    self.entries.get(handle).map(|s| s.as_str())
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Handles sorted longest first, then alphabetically.
  ///
  /// Substituting in this order keeps a handle that is a prefix of another
  /// from clobbering it.
  pub fn handles_longest_first(&self) -> Vec<&str> {
    let mut handles: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
    handles.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    handles
  }
}

impl FromIterator<(String, String)> for TranslationTable {
  fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
    Self {
      entries: iter.into_iter().collect(),
    }
  }
}
