//! Content-derived node fingerprints.
//!
//! A file fingerprint depends only on the file's path. A task fingerprint
//! depends on the sorted set of its neighbor names followed by its command,
//! so the order in which edges were declared never changes it.

/// Fingerprint of a file node at `path`.
pub fn file_fingerprint(path: &str) -> String {
  strata_fingerprint::encode(path)
}

/// Fingerprint of a task node from its neighbor names and command.
pub fn task_fingerprint<S: AsRef<str>>(neighbors: &[S], command: &str) -> String {
  let mut parts: Vec<&str> = neighbors.iter().map(|n| n.as_ref()).collect();
  parts.sort_unstable();
  parts.dedup();
  parts.push(command);
  strata_fingerprint::encode(&parts.join("\n"))
}
