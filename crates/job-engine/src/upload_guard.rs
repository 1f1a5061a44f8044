//! RAII ownership transfer for an uploaded audio file: a caller hands the
//! engine a path to a temp upload and the guard deletes it on drop unless
//! the admission path explicitly commits it into a job record. Keeps
//! "delete the upload if we never queued it" from becoming a scattered set
//! of manual cleanup calls at every early-return in `create_job`.

use std::path::{Path, PathBuf};
use tracing::warn;

pub struct UploadGuard {
    path: PathBuf,
    committed: bool,
}

impl UploadGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            committed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hands ownership of the file to the caller (a queued job record). The
    /// guard will not delete it on drop.
    pub fn commit(mut self) -> PathBuf {
        self.committed = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if self.committed || self.path.as_os_str().is_empty() {
            return;
        }
        if let Err(error) = std::fs::remove_file(&self.path) {
            if error.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), %error, "failed to clean up uncommitted upload");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn uncommitted_guard_deletes_file_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upload.wav");
        fs::write(&path, b"audio").unwrap();

        {
            let _guard = UploadGuard::new(path.clone());
        }
        assert!(!path.exists());
    }

    #[test]
    fn committed_guard_leaves_file_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upload.wav");
        fs::write(&path, b"audio").unwrap();

        let guard = UploadGuard::new(path.clone());
        let committed_path = guard.commit();
        assert_eq!(committed_path, path);
        assert!(path.exists());
    }
}
