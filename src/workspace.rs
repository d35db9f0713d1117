use std::path::Path;

use tempfile::TempDir;

use crate::error::DownloadError;

const PREFIX: &str = "media-fetch-";

/// Per-request scratch directory. Removed exactly once: synchronously by
/// [`Workspace::cleanup`], or on drop (including when a response body holding it
/// is dropped on client disconnect). Inside a runtime the drop-time removal runs
/// on the blocking pool so the worker thread never waits on `remove_dir_all`.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
}

impl Workspace {
    pub fn create(root: &Path) -> Result<Self, DownloadError> {
        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .tempdir_in(root)
            .map_err(|e| {
                DownloadError::fs(
                    format!("Failed to create workspace in {}", root.display()),
                    e,
                )
            })?;
        log::debug!("[WORKSPACE] Created {}", dir.path().display());
        Ok(Self { dir: Some(dir) })
    }

    pub fn path(&self) -> &Path {
        // The TempDir is only taken by `cleanup` (consuming) and `drop`.
        self.dir
            .as_ref()
            .map(TempDir::path)
            .unwrap_or_else(|| Path::new(""))
    }

    pub fn cleanup(mut self) {
        if let Some(dir) = self.dir.take() {
            remove(dir);
        }
    }
}

fn remove(dir: TempDir) {
    let path = dir.path().to_path_buf();
    match dir.close() {
        Ok(()) => log::debug!("[WORKSPACE] Removed {}", path.display()),
        Err(e) => log::warn!("[WORKSPACE] Failed to remove {}: {}", path.display(), e),
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove(dir));
            }
            Err(_) => remove(dir),
        }
    }
}

/// Poll until `root` has no entries left; returns how many remain at the deadline.
#[cfg(test)]
pub(crate) async fn settle(root: &Path) -> usize {
    let count = || std::fs::read_dir(root).map(|d| d.count()).unwrap_or(0);
    for _ in 0..500 {
        if count() == 0 {
            return 0;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(root: &Path) -> usize {
        std::fs::read_dir(root).unwrap().count()
    }

    #[test]
    fn create_makes_unique_dirs_under_root() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::create(root.path()).unwrap();
        let b = Workspace::create(root.path()).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(root.path()));
        assert!(a.path().is_dir());
        assert!(a
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(PREFIX));
        assert_eq!(entries(root.path()), 2);
    }

    #[test]
    fn cleanup_removes_contents_recursively() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path()).unwrap();
        std::fs::create_dir(ws.path().join("nested")).unwrap();
        std::fs::write(ws.path().join("nested").join("a.mp4"), b"data").unwrap();
        ws.cleanup();
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        {
            let ws = Workspace::create(root.path()).unwrap();
            std::fs::write(ws.path().join("x.mkv"), b"data").unwrap();
        }
        assert_eq!(entries(root.path()), 0);
    }

    #[actix_web::test]
    async fn drop_inside_runtime_removes_off_thread() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path()).unwrap();
        std::fs::create_dir(ws.path().join("nested")).unwrap();
        std::fs::write(ws.path().join("nested").join("x.mkv"), b"data").unwrap();
        drop(ws);
        assert_eq!(settle(root.path()).await, 0);
    }

    #[actix_web::test]
    async fn cleanup_inside_runtime_is_immediate() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path()).unwrap();
        ws.cleanup();
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn cleanup_of_vanished_dir_is_swallowed() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path()).unwrap();
        std::fs::remove_dir_all(ws.path()).unwrap();
        ws.cleanup();
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn create_fails_for_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let err = Workspace::create(&root.path().join("missing")).unwrap_err();
        assert!(matches!(err, DownloadError::Filesystem { .. }));
    }
}
