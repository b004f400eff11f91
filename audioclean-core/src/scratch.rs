//! Per-batch temporary storage.
//!
//! One `ScratchSpace` is acquired when a batch starts and dropped when it
//! ends, whatever the per-item outcomes were. Dropping removes the directory
//! and everything in it. Stages that need files create them through
//! [`ScratchSpace::temp_file`] so each file is also removed as soon as its
//! handle goes out of scope.

use std::path::Path;

use tempfile::{Builder, NamedTempFile, TempDir};
use tracing::debug;

use crate::error::Result;

const DIR_PREFIX: &str = "audioclean-";

#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    /// Create a scratch directory under the system temp dir.
    pub fn new() -> Result<Self> {
        let dir = Builder::new().prefix(DIR_PREFIX).tempdir()?;
        debug!(path = %dir.path().display(), "scratch space acquired");
        Ok(Self { dir })
    }

    /// Create a scratch directory under `parent`.
    pub fn new_in(parent: &Path) -> Result<Self> {
        let dir = Builder::new().prefix(DIR_PREFIX).tempdir_in(parent)?;
        debug!(path = %dir.path().display(), "scratch space acquired");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A new empty file inside the scratch directory, deleted on drop.
    pub fn temp_file(&self, suffix: &str) -> Result<NamedTempFile> {
        Ok(Builder::new()
            .prefix("stage-")
            .suffix(suffix)
            .tempfile_in(self.dir.path())?)
    }

    /// Remove the directory now, reporting any IO failure.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!(path = %path.display(), "scratch space released");
        Ok(())
    }
}
