//! Ephemeral per-download working directories

use std::future::Future;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::utils::error::PipelineError;

const SCRATCH_PREFIX: &str = "mediagrab-";

/// Allocates uniquely named scratch directories under a root
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
}

impl ScratchSpace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run `f` inside a fresh directory that is removed with all its contents
    /// once `f` completes, whatever the outcome.
    ///
    /// Removal also happens if `f` panics or the returned future is dropped
    /// before completion: the directory guard lives inside this future.
    pub async fn with_directory<T, F, Fut>(&self, f: F) -> Result<T, PipelineError>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        tokio::fs::create_dir_all(&self.root).await?;
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&self.root)?;
        debug!("Created scratch directory {}", dir.path().display());

        let result = f(dir.path().to_path_buf()).await;
        release(dir);
        result
    }
}

fn release(dir: TempDir) {
    let path = dir.path().to_path_buf();
    match dir.close() {
        Ok(()) => debug!("Removed scratch directory {}", path.display()),
        Err(e) => {
            // close() consumed the guard; try once more so nothing is left behind
            warn!("Failed to remove scratch directory {}: {}", path.display(), e);
            if let Err(e) = std::fs::remove_dir_all(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Scratch directory {} leaked: {}", path.display(), e);
                }
            }
        }
    }
}
