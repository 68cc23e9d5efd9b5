//! Write-after-receipt persistence.
//!
//! A body is written to a temporary sibling and renamed into place, so a
//! target path either holds a complete capture or does not exist.

use std::io;
use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::DownloadError;
use super::constants::TEMP_FILE_NAME;

/// Writes `body` to `target`, creating parent directories.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] naming the path that could not be created
/// or written. The temporary file is removed on failure.
pub(crate) async fn write_atomic(target: &Path, body: &[u8]) -> Result<(), DownloadError> {
    let parent = target.parent().ok_or_else(|| {
        DownloadError::io(
            target,
            io::Error::new(io::ErrorKind::InvalidInput, "target has no parent directory"),
        )
    })?;
    fs::create_dir_all(parent)
        .await
        .map_err(|e| DownloadError::io(parent, e))?;

    let temp = parent.join(TEMP_FILE_NAME);
    if let Err(error) = write_then_rename(&temp, target, body).await {
        let _ = fs::remove_file(&temp).await;
        return Err(error);
    }
    debug!(path = %target.display(), bytes = body.len(), "file written");
    Ok(())
}

async fn write_then_rename(temp: &Path, target: &Path, body: &[u8]) -> Result<(), DownloadError> {
    let mut file = fs::File::create(temp)
        .await
        .map_err(|e| DownloadError::io(temp, e))?;
    file.write_all(body)
        .await
        .map_err(|e| DownloadError::io(temp, e))?;
    file.flush().await.map_err(|e| DownloadError::io(temp, e))?;
    drop(file);

    fs::rename(temp, target)
        .await
        .map_err(|e| DownloadError::io(target, e))
}

/// Removes empty directories from `start` upwards, stopping at `root`.
///
/// Used after a failed natural-path write so the mirror does not keep empty
/// directory chains for captures that ended up in the fallback.
pub(crate) async fn remove_empty_dirs(start: &Path, root: &Path) {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        if fs::remove_dir(dir).await.is_err() {
            break;
        }
        debug!(path = %dir.display(), "removed empty directory");
        current = dir.parent();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_write_atomic_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("2020/example.com/a/b.html");

        write_atomic(&target, b"<html></html>").await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"<html></html>");
        assert!(!target.with_file_name(TEMP_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("page.html");
        std::fs::write(&target, b"old").unwrap();

        write_atomic(&target, b"new").await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_write_atomic_fails_when_parent_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("blocker"), b"file").unwrap();
        let target = temp_dir.path().join("blocker/child.html");

        let result = write_atomic(&target, b"body").await;

        assert!(matches!(result, Err(DownloadError::Io { .. })));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_write_atomic_leaves_nothing_when_target_is_a_directory() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("dir");
        std::fs::create_dir_all(target.join("inner")).unwrap();

        let result = write_atomic(&target, b"body").await;

        assert!(result.is_err());
        assert!(target.is_dir());
        assert!(!temp_dir.path().join(TEMP_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_remove_empty_dirs_stops_at_root_and_non_empty() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("keep/a/b/c")).unwrap();
        std::fs::write(root.join("keep/file"), b"x").unwrap();

        remove_empty_dirs(&root.join("keep/a/b/c"), root).await;

        assert!(!root.join("keep/a").exists());
        assert!(root.join("keep").is_dir());
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_remove_empty_dirs_never_removes_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("out");
        std::fs::create_dir_all(root.join("x")).unwrap();

        remove_empty_dirs(&root.join("x"), &root).await;

        assert!(root.is_dir());
        assert!(!root.join("x").exists());
    }
}
