//! Scoped ownership of downloaded temp files.
//!
//! [`TempSource`] deletes its file when dropped, so the file goes away on
//! normal return, early return, error results, and panics alike. Deletion
//! problems are logged and never replace the operation's own result.

use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct TempSource {
    path: PathBuf,
}

impl TempSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempSource {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed temp file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove temp file {}: {}", self.path.display(), e),
        }
    }
}

/// Run `f` against the temp file, deleting it once `f`'s future completes.
pub async fn with_temp_source<F, Fut, T>(temp_path: &Path, f: F) -> T
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = T>,
{
    let guard = TempSource::new(temp_path.to_path_buf());
    let output = f(guard.path().to_path_buf()).await;
    drop(guard);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_temp_file_removed_after_success() {
        let dir = TempDir::new().unwrap();
        let temp = dir.path().join("abc.jpg");
        std::fs::write(&temp, b"bytes").unwrap();

        let seen = with_temp_source(&temp, |path| async move { path.exists() }).await;

        assert!(seen);
        assert!(!temp.exists());
    }

    #[tokio::test]
    async fn test_temp_file_removed_after_error_result() {
        let dir = TempDir::new().unwrap();
        let temp = dir.path().join("abc.jpg");
        std::fs::write(&temp, b"bytes").unwrap();

        let result: Result<(), String> =
            with_temp_source(&temp, |_| async { Err("transform failed".to_string()) }).await;

        assert_eq!(result.unwrap_err(), "transform failed");
        assert!(!temp.exists());
    }

    #[tokio::test]
    async fn test_temp_file_removed_on_panic() {
        let dir = TempDir::new().unwrap();
        let temp = dir.path().join("abc.jpg");
        std::fs::write(&temp, b"bytes").unwrap();

        let task_path = temp.clone();
        let handle = tokio::spawn(async move {
            with_temp_source(&task_path, |_| async { panic!("codec exploded") }).await
        });

        assert!(handle.await.is_err());
        assert!(!temp.exists());
    }

    #[tokio::test]
    async fn test_missing_temp_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let temp = dir.path().join("never-written.jpg");

        let value = with_temp_source(&temp, |_| async { 42 }).await;
        assert_eq!(value, 42);
    }

    #[test]
    fn test_guard_drop_deletes() {
        let dir = TempDir::new().unwrap();
        let temp = dir.path().join("x.png");
        std::fs::write(&temp, b"bytes").unwrap();

        {
            let guard = TempSource::new(temp.clone());
            assert!(guard.path().exists());
        }
        assert!(!temp.exists());
    }
}
