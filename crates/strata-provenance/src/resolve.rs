//! Resolution of recorded file names to repository-relative paths.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Directories holding substrate metadata rather than tracked files.
const METADATA_DIRS: &[&str] = &[".git", ".datalad", ".annex"];

/// Basename index of the files under a repository root.
///
/// Candidate lists are sorted, so resolution does not depend on directory
/// iteration order.
#[derive(Debug, Clone, Default)]
pub struct PathIndex {
  by_basename: HashMap<String, Vec<String>>,
  paths: HashSet<String>,
}

impl PathIndex {
  /// Walk `root` and index every non-directory entry.
  ///
  /// Symlinks are indexed without being followed; annexed files are symlinks.
  pub fn build(root: &Path) -> Self {
    let mut index = Self::default();
    let walker = WalkDir::new(root)
      .follow_links(false)
      .into_iter()
      .filter_entry(|e| !is_metadata_dir(e));

    for entry in walker.filter_map(|e| e.ok()) {
      if entry.file_type().is_dir() {
        continue;
      }
      let Ok(relative) = entry.path().strip_prefix(root) else {
        continue;
      };
      index.insert(&to_slash(relative));
    }

    for candidates in index.by_basename.values_mut() {
      candidates.sort();
    }
    debug!(root = %root.display(), files = index.paths.len(), "indexed repository tree");
    index
  }

  /// Build an index from a list of repository-relative paths.
  pub fn from_paths<I, S>(paths: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut index = Self::default();
    for path in paths {
      index.insert(path.as_ref());
    }
    for candidates in index.by_basename.values_mut() {
      candidates.sort();
    }
    index
  }

  fn insert(&mut self, path: &str) {
    let path = normalize(path);
    if path.is_empty() || self.paths.contains(&path) {
      return;
    }
    let basename = path.rsplit('/').next().unwrap_or(path.as_str()).to_string();
    self.by_basename.entry(basename).or_default().push(path.clone());
    self.paths.insert(path);
  }

  pub fn len(&self) -> usize {
    self.paths.len()
  }

  pub fn is_empty(&self) -> bool {
    self.paths.is_empty()
  }

  /// Resolve a recorded name, relative to `pwd` when given.
  ///
  /// An existing path is used as is. Otherwise the lexicographically first
  /// file with the same basename wins. Unknown names keep their logical form.
  pub fn resolve(&self, name: &str, pwd: Option<&str>) -> String {
    let name = normalize(name);

    if let Some(pwd) = pwd.map(normalize).filter(|p| !p.is_empty()) {
      let joined = normalize(&format!("{pwd}/{name}"));
      if self.paths.contains(&joined) {
        return joined;
      }
    }
    if self.paths.contains(&name) {
      return name;
    }

    let basename = name.rsplit('/').next().unwrap_or(name.as_str());
    match self.by_basename.get(basename).map(Vec::as_slice) {
      Some([only]) => only.clone(),
      Some([first, rest @ ..]) => {
        warn!(
          name = %name,
          chosen = %first,
          others = rest.len(),
          "ambiguous basename, using first candidate"
        );
        first.clone()
      }
      _ => name,
    }
  }
}

fn is_metadata_dir(entry: &DirEntry) -> bool {
  entry.file_type().is_dir()
    && entry
      .file_name()
      .to_str()
      .is_some_and(|name| METADATA_DIRS.contains(&name))
}

fn to_slash(path: &Path) -> String {
  path
    .components()
    .filter_map(|c| match c {
      Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
      _ => None,
    })
    .collect::<Vec<_>>()
    .join("/")
}

/// Drop `.` segments, empty segments and trailing slashes.
fn normalize(path: &str) -> String {
  path
    .split('/')
    .filter(|part| !part.is_empty() && *part != ".")
    .collect::<Vec<_>>()
    .join("/")
}
