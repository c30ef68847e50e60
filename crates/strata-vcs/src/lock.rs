//! File-based repository locks.
//!
//! A lock is a file created with `create_new` in a shared lock directory; it
//! records the holder's pid and is removed when the guard drops.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::VcsError;

/// Held lock on one repository path.
#[derive(Debug)]
pub struct RepoLock {
  path: PathBuf,
}

impl RepoLock {
  /// Acquire the lock for `repo`, waiting at most `timeout`.
  ///
  /// The lock directory is created if needed. While another holder owns the
  /// lock the file is polled every `poll`.
  pub async fn acquire(
    lock_dir: &Path,
    repo: &str,
    timeout: Duration,
    poll: Duration,
  ) -> Result<Self, VcsError> {
    fs::create_dir_all(lock_dir).await?;
    let path = lock_dir.join(format!("{}.lock", lock_key(repo)));
    let started = Instant::now();
    let mut announced = false;

    loop {
      match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
      {
        Ok(mut file) => {
          let payload = json!({
            "pid": std::process::id(),
            "repo": repo,
            "acquired_at": Utc::now().to_rfc3339(),
          });
          let _ = file.write_all(format!("{payload}\n").as_bytes()).await;
          let _ = file.sync_all().await;
          debug!(lock = %path.display(), "acquired repository lock");
          return Ok(Self { path });
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
          let waited = started.elapsed();
          if waited >= timeout {
            return Err(VcsError::LockTimeout {
              path,
              waited_ms: waited.as_millis() as u64,
            });
          }
          if !announced {
            warn!(lock = %path.display(), "repository lock held, waiting");
            announced = true;
          }
          tokio::time::sleep(poll.min(timeout - waited)).await;
        }
        Err(e) => return Err(e.into()),
      }
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Drop for RepoLock {
  fn drop(&mut self) {
    let _ = std::fs::remove_file(&self.path);
  }
}

/// File-name-safe key for a repository path or URL.
pub fn lock_key(repo: &str) -> String {
  let key: String = repo
    .trim_end_matches('/')
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
        c
      } else {
        '_'
      }
    })
    .collect();
  if key.is_empty() { "_".to_string() } else { key }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SHORT: Duration = Duration::from_millis(50);
  const POLL: Duration = Duration::from_millis(5);

  #[test]
  fn test_lock_key_is_file_name_safe() {
    assert_eq!(lock_key("/data/study/sub-01/"), "_data_study_sub-01");
    assert_eq!(lock_key("https://host/ds.git"), "https___host_ds.git");
  }

  #[tokio::test]
  async fn test_lock_is_released_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    let lock = RepoLock::acquire(dir.path(), "/repo", SHORT, POLL).await.unwrap();
    let path = lock.path().to_path_buf();
    assert!(path.exists());
    drop(lock);
    assert!(!path.exists());

    RepoLock::acquire(dir.path(), "/repo", SHORT, POLL).await.unwrap();
  }

  #[tokio::test]
  async fn test_lock_file_records_holder_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let lock = RepoLock::acquire(dir.path(), "/data/étude \"q\"", SHORT, POLL).await.unwrap();

    let text = std::fs::read_to_string(lock.path()).unwrap();
    let payload: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(payload["repo"], "/data/étude \"q\"");
    assert_eq!(payload["pid"], std::process::id());
    assert!(payload["acquired_at"].is_string());
  }

  #[tokio::test]
  async fn test_contended_lock_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let _held = RepoLock::acquire(dir.path(), "/repo", SHORT, POLL).await.unwrap();

    let err = RepoLock::acquire(dir.path(), "/repo", SHORT, POLL).await.unwrap_err();
    match err {
      VcsError::LockTimeout { waited_ms, .. } => assert!(waited_ms >= 50),
      other => panic!("expected LockTimeout, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_waiter_gets_lock_after_release() {
    let dir = tempfile::tempdir().unwrap();
    let held = RepoLock::acquire(dir.path(), "/repo", SHORT, POLL).await.unwrap();

    let lock_dir = dir.path().to_path_buf();
    let waiter = tokio::spawn(async move {
      RepoLock::acquire(&lock_dir, "/repo", Duration::from_secs(5), POLL).await
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(held);

    assert!(waiter.await.unwrap().is_ok());
  }

  #[tokio::test]
  async fn test_distinct_repos_do_not_contend() {
    let dir = tempfile::tempdir().unwrap();
    let _a = RepoLock::acquire(dir.path(), "/a", SHORT, POLL).await.unwrap();
    let _b = RepoLock::acquire(dir.path(), "/b", SHORT, POLL).await.unwrap();
  }
}
