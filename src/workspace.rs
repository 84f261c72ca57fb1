//! Per-job scratch directory for intermediate audio.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Result, VoiceStampError};

const PREFIX: &str = "voicestamp-";

/// An exclusively-owned temporary directory.
///
/// Call [`Workspace::release`] when the job ends; dropping it without
/// releasing still removes the directory, but silently.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    keep: bool,
}

impl Workspace {
    /// Create a uniquely-named directory under `root` (the system temp dir if `None`).
    /// With `keep`, `release` leaves the directory on disk.
    pub fn create(root: Option<&Path>, keep: bool) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX);
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| VoiceStampError::workspace("create temporary directory", e))?;

        log::debug!("workspace at {}", dir.path().display());
        Ok(Workspace { dir, keep })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of an artifact inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the directory tree (or keep it, if requested). Returns the
    /// path that was released.
    pub fn release(self) -> Result<PathBuf> {
        let path = self.dir.path().to_path_buf();
        if self.keep {
            let kept = self.dir.keep();
            log::info!("keeping working files in {}", kept.display());
            return Ok(kept);
        }
        self.dir
            .close()
            .map_err(|e| VoiceStampError::workspace(format!("remove {}", path.display()), e))?;
        Ok(path)
    }
}
