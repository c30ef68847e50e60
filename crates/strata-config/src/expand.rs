//! Name-range expansion.
//!
//! A handle of the form `prefix{A..B}suffix` stands for the names
//! `prefixAsuffix` through `prefixBsuffix`, inclusive. Handles without braces
//! expand to themselves.

/// Why a handle could not be expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandError {
  Unbalanced,
  NotNumeric(String),
  Reversed { start: u64, end: u64 },
}

impl std::fmt::Display for ExpandError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ExpandError::Unbalanced => write!(f, "unbalanced braces in name range"),
      ExpandError::NotNumeric(range) => write!(f, "name range '{{{}}}' is not numeric", range),
      ExpandError::Reversed { start, end } => {
        write!(f, "name range {}..{} is reversed", start, end)
      }
    }
  }
}

/// Expand a single handle into its concrete names.
pub fn expand_handle(handle: &str) -> Result<Vec<String>, ExpandError> {
  let Some(open) = handle.find('{') else {
    if handle.contains('}') {
      return Err(ExpandError::Unbalanced);
    }
    return Ok(vec![handle.to_string()]);
  };
  let close = handle[open..]
    .find('}')
    .map(|i| open + i)
    .ok_or(ExpandError::Unbalanced)?;

  let prefix = &handle[..open];
  let range = &handle[open + 1..close];
  let suffix = &handle[close + 1..];

  let (start, end) = range
    .split_once("..")
    .ok_or_else(|| ExpandError::NotNumeric(range.to_string()))?;
  let start: u64 = start
    .trim()
    .parse()
    .map_err(|_| ExpandError::NotNumeric(range.to_string()))?;
  let end: u64 = end
    .trim()
    .parse()
    .map_err(|_| ExpandError::NotNumeric(range.to_string()))?;

  if start > end {
    return Err(ExpandError::Reversed { start, end });
  }

  Ok(
    (start..=end)
      .map(|i| format!("{}{}{}", prefix, i, suffix))
      .collect(),
  )
}

/// Expand a comma-separated list of handles, dropping empty entries.
pub fn expand_list(field: &str) -> Result<Vec<String>, ExpandError> {
  let mut names = Vec::new();
  for handle in field.split(',').map(str::trim).filter(|h| !h.is_empty()) {
    names.extend(expand_handle(handle)?);
  }
  Ok(names)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_expands_inclusive_range() {
    assert_eq!(
      expand_handle("file{1..3}.png").unwrap(),
      vec!["file1.png", "file2.png", "file3.png"]
    );
  }

  #[test]
  fn test_single_element_range() {
    assert_eq!(expand_handle("run{7..7}").unwrap(), vec!["run7"]);
  }

  #[test]
  fn test_plain_handle_is_unchanged() {
    assert_eq!(expand_handle("in1").unwrap(), vec!["in1"]);
  }

  #[test]
  fn test_reversed_range_is_error() {
    assert_eq!(
      expand_handle("file{3..1}.png"),
      Err(ExpandError::Reversed { start: 3, end: 1 })
    );
  }

  #[test]
  fn test_non_numeric_range_is_error() {
    assert!(matches!(
      expand_handle("file{a..c}.png"),
      Err(ExpandError::NotNumeric(_))
    ));
    assert!(matches!(
      expand_handle("file{1-3}.png"),
      Err(ExpandError::NotNumeric(_))
    ));
  }

  #[test]
  fn test_unbalanced_braces_are_error() {
    assert_eq!(expand_handle("file{1..3.png"), Err(ExpandError::Unbalanced));
    assert_eq!(expand_handle("file1..3}.png"), Err(ExpandError::Unbalanced));
  }

  #[test]
  fn test_list_expansion() {
    assert_eq!(
      expand_list("a, b{1..2} ,,c").unwrap(),
      vec!["a", "b1", "b2", "c"]
    );
    assert!(expand_list("").unwrap().is_empty());
  }
}
