//! Output naming and atomic publishing.
//!
//! The mix is written to a staging file in the destination's own directory so
//! publishing is a rename on the same filesystem. Until `publish` succeeds the
//! destination is never touched.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{Result, VoiceStampError};
use crate::template::{Placeholder, Placeholders};

const STAGING_PREFIX: &str = ".voicestamp-";
/// The encoder picks its container from the extension.
const STAGING_SUFFIX: &str = ".mp3";
/// Mode of the published file before the umask, as for any newly created file.
#[cfg(unix)]
const PUBLISHED_MODE: u32 = 0o666;

/// Split `path`'s file name into base name and extension (without the dot).
pub fn split_file_name(path: &Path) -> (String, String) {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    (name, ext)
}

/// Apply the output name template to `source`.
pub fn format_file_name(source: &Path, format: &str) -> String {
    let (name, ext) = split_file_name(source);
    Placeholders::new()
        .with(Placeholder::Name, name)
        .with(Placeholder::Ext, ext)
        .render(format)
}

/// Decide where the output for `source` goes.
///
/// - no explicit output: formatted name next to the source
/// - explicit existing directory: formatted name inside it
/// - explicit existing file, or a path that does not exist yet: that path
pub fn resolve_output_path(source: &Path, file_out: Option<&Path>, format: &str) -> PathBuf {
    let formatted = format_file_name(source, format);
    match file_out {
        None => source
            .parent()
            .map(|dir| dir.join(&formatted))
            .unwrap_or_else(|| PathBuf::from(&formatted)),
        Some(out) if out.is_dir() => out.join(&formatted),
        Some(out) => out.to_path_buf(),
    }
}

/// A freshly-created file next to the destination that the mix is written into.
#[derive(Debug)]
pub struct StagedOutput {
    file: NamedTempFile,
    destination: PathBuf,
}

impl StagedOutput {
    pub fn create(destination: &Path) -> Result<Self> {
        let dir = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX).suffix(STAGING_SUFFIX);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(PUBLISHED_MODE));
        }
        let file = builder
            .tempfile_in(dir)
            .map_err(|e| {
                VoiceStampError::workspace(format!("create staging file in {}", dir.display()), e)
            })?;
        Ok(StagedOutput {
            file,
            destination: destination.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Replace the destination with the staged file.
    pub fn publish(self) -> Result<PathBuf> {
        let StagedOutput { file, destination } = self;

        if destination.exists() {
            fs::remove_file(&destination).map_err(|e| VoiceStampError::Publish {
                path: destination.clone(),
                source: e,
            })?;
        }
        file.persist(&destination)
            .map_err(|e| VoiceStampError::Publish {
                path: destination.clone(),
                source: e.error,
            })?;
        Ok(destination)
    }

    /// Remove the staged file without publishing.
    pub fn discard(self) -> Result<()> {
        let path = self.file.path().to_path_buf();
        self.file
            .close()
            .map_err(|e| VoiceStampError::workspace(format!("remove {}", path.display()), e))
    }
}
