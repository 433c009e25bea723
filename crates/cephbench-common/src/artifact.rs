//! Scoped cleanup for capture artifacts.
//!
//! Capture commands stream stdout straight into their destination file, so a
//! timeout or a failed invocation can leave a truncated artifact behind.
//! Instead of deleting the file on every error path separately, the artifact
//! is held by a guard: commit it on success, and anything else (error return,
//! `?`, panic) removes the file on drop.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Removes the guarded file on drop unless [`ArtifactGuard::commit`] was
/// called.
#[derive(Debug)]
pub struct ArtifactGuard {
    path: PathBuf,
    committed: bool,
}

impl ArtifactGuard {
    /// Guard an artifact path. The file itself is created by the caller.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            committed: false,
        }
    }

    /// The guarded path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mark the artifact as complete; it will be kept.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if !self.committed && self.path.exists() {
            debug!("discarding partial artifact {}", self.path.display());
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
