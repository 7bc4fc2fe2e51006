//! Advisory lock file guarding the pipeline index across processes.
//!
//! Create-exclusive with bounded retry. A lock older than the staleness limit
//! is treated as abandoned and removed. The lock is released when the guard
//! drops, on success and on error alike.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use chrono::Utc;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use tigerclaw_common::TigerclawError;

const RETRY_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub struct PipelineLock {
    path: PathBuf,
}

impl PipelineLock {
    /// Acquire the lock at `path`, waiting up to `wait`.
    pub async fn acquire(path: &Path, wait: Duration, stale: Duration) -> Result<Self, TigerclawError> {
        let deadline = Instant::now() + wait;
        loop {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .await
            {
                Ok(mut file) => {
                    let owner = json!({ "pid": std::process::id(), "ts": Utc::now().to_rfc3339() });
                    file.write_all(owner.to_string().as_bytes()).await?;
                    debug!(path = %path.display(), "Acquired pipeline lock");
                    return Ok(Self { path: path.to_path_buf() });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if is_stale(path, stale).await {
                        warn!(path = %path.display(), "Removing stale pipeline lock");
                        match tokio::fs::remove_file(path).await {
                            Ok(()) => continue,
                            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                            // Unremovable: wait it out like a held lock.
                            Err(e) => warn!(error = %e, path = %path.display(), "Failed to remove stale pipeline lock"),
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }
            if Instant::now() >= deadline {
                return Err(TigerclawError::LockTimeout(wait));
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn is_stale(path: &Path, stale: Duration) -> bool {
    let Ok(meta) = tokio::fs::metadata(path).await else {
        // Vanished between attempts; retry immediately.
        return true;
    };
    meta.modified()
        .ok()
        .and_then(|m| SystemTime::now().duration_since(m).ok())
        .is_some_and(|age| age > stale)
}

impl Drop for PipelineLock {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Released pipeline lock"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, path = %self.path.display(), "Failed to release pipeline lock"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.lock");
        let held = PipelineLock::acquire(&path, Duration::from_secs(1), Duration::from_secs(300))
            .await
            .unwrap();

        let err = PipelineLock::acquire(&path, Duration::from_millis(600), Duration::from_secs(300))
            .await
            .unwrap_err();
        assert!(matches!(err, TigerclawError::LockTimeout(_)));

        drop(held);
        assert!(!path.exists());
        PipelineLock::acquire(&path, Duration::from_secs(1), Duration::from_secs(300))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn stale_lock_is_overridden() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.lock");
        std::fs::write(&path, "{}").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let lock = PipelineLock::acquire(&path, Duration::from_secs(1), Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(lock.path(), path.as_path());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unremovable_stale_lock_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.lock");
        // A directory at the lock path exists and ages but cannot be unlinked.
        std::fs::create_dir(&path).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = PipelineLock::acquire(&path, Duration::from_millis(600), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, TigerclawError::LockTimeout(_)));
        assert!(path.is_dir());
    }

    #[tokio::test]
    async fn lock_is_released_when_work_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.lock");

        async fn failing(path: &Path) -> Result<(), TigerclawError> {
            let _lock = PipelineLock::acquire(path, Duration::from_secs(1), Duration::from_secs(300)).await?;
            Err(TigerclawError::Validation("boom".into()))
        }
        assert!(failing(&path).await.is_err());
        assert!(!path.exists());
    }
}
