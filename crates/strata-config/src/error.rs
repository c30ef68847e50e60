use thiserror::Error;

/// Errors raised while reading workflow specifications, translation tables
/// and configuration files.
#[derive(Debug, Error)]
pub enum SpecError {
  /// A specification line does not follow the record grammar.
  #[error("malformed record on line {line}: {message} (expected {expected} fields)")]
  MalformedRecord {
    line: usize,
    message: String,
    expected: &'static str,
  },

  /// A translation table row is not a (handle, path) pair.
  #[error("malformed translation row at line {line}: {message}")]
  MalformedRow { line: usize, message: String },

  /// The same handle appears twice in a translation table.
  #[error("duplicate handle '{handle}' in translation table at line {line}")]
  DuplicateHandle { handle: String, line: usize },

  #[error("failed to read translation table: {0}")]
  Table(#[from] csv::Error),

  #[error("invalid configuration: {0}")]
  Config(#[from] serde_json::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}
