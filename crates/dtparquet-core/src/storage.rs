//! Filesystem staging and atomic commit.
//!
//! Every export is written to a temporary artifact that lives in the same
//! directory as its destination and is renamed into place only once the
//! file is complete. Keeping the artifact in the destination directory
//! makes the final rename a same-filesystem, atomic replacement:
//!
//! ```text
//! out/
//!   auto.parquet          # previous version, untouched until commit
//!   auto.parquet.tmp      # in-flight export
//! ```
//!
//! - [`StagedFile`] owns the temporary artifact and removes it on every
//!   path that does not end in [`StagedFile::commit`].
//! - [`sweep`] removes artifacts orphaned by crashed processes.
//!
//! Only the local filesystem is supported.

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use log::{debug, warn};
use snafu::prelude::*;

pub mod error;
pub mod sweep;

pub use error::{BackendError, StorageError};
use error::{NoFileNameSnafu, OtherIoSnafu};

/// General result type used by storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Suffix shared by every temporary export artifact.
pub const TEMP_SUFFIX: &str = ".parquet.tmp";

/// Sibling temporary path used while staging `target`.
///
/// `auto.parquet` stages as `auto.parquet.tmp`; a target without the
/// `.parquet` extension still gets the full [`TEMP_SUFFIX`] so the orphan
/// sweep recognizes it.
pub fn temp_path_for(target: &Path) -> StorageResult<PathBuf> {
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .context(NoFileNameSnafu {
            path: target.display().to_string(),
        })?;
    let tmp_name = match name.strip_suffix(".parquet") {
        Some(_) => format!("{name}.tmp"),
        None => format!("{name}{TEMP_SUFFIX}"),
    };
    Ok(target.with_file_name(tmp_name))
}

pub(crate) fn create_parent_dir(abs: &Path) -> StorageResult<()> {
    if let Some(parent) = abs.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: parent.display().to_string(),
            })?;
    }
    Ok(())
}

/// Open an existing file for reading.
pub fn open_for_read(path: &Path) -> StorageResult<File> {
    File::open(path).map_err(|e| StorageError::from_io(path, e))
}

/// Deletes a staged export's temp artifact when dropped, until the
/// artifact has been renamed over its target.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Keep the artifact: it now lives at the target path.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not discard staged {}: {e}", self.path.display()),
        }
    }
}

/// A temporary artifact staged next to its final destination.
///
/// The artifact is deleted when the `StagedFile` is dropped or discarded
/// without being committed.
pub struct StagedFile {
    tmp_path: PathBuf,
    final_path: PathBuf,
    file: Option<File>,
    guard: TempFileGuard,
}

impl StagedFile {
    /// Create the destination directory if needed and open a fresh
    /// temporary artifact for `target`.
    pub fn create(target: &Path) -> StorageResult<Self> {
        create_parent_dir(target)?;
        let tmp_path = temp_path_for(target)?;

        let file = File::create(&tmp_path)
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: tmp_path.display().to_string(),
            })?;
        let guard = TempFileGuard::new(tmp_path.clone());
        debug!("staging {} at {}", target.display(), tmp_path.display());

        Ok(Self {
            tmp_path,
            final_path: target.to_path_buf(),
            file: Some(file),
            guard,
        })
    }

    /// Path of the temporary artifact.
    pub fn temp_path(&self) -> &Path {
        &self.tmp_path
    }

    /// Path the artifact is committed to.
    pub fn target_path(&self) -> &Path {
        &self.final_path
    }

    /// A new handle onto the temporary artifact, for writers that need to
    /// own their sink.
    pub fn writer(&self) -> StorageResult<File> {
        let path = self.tmp_path.display().to_string();
        match &self.file {
            Some(f) => f
                .try_clone()
                .map_err(BackendError::Local)
                .context(OtherIoSnafu { path }),
            None => Err(BackendError::Local(std::io::Error::other(
                "staged file already closed",
            )))
            .context(OtherIoSnafu { path }),
        }
    }

    /// Fsync the artifact and rename it over the destination.
    ///
    /// Any writer obtained from [`StagedFile::writer`] must be flushed and
    /// closed before calling this.
    pub fn commit(mut self) -> StorageResult<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()
                .map_err(BackendError::Local)
                .context(OtherIoSnafu {
                    path: self.tmp_path.display().to_string(),
                })?;
        }

        fs::rename(&self.tmp_path, &self.final_path)
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: self.final_path.display().to_string(),
            })?;

        // Renamed; nothing left to clean up.
        self.guard.disarm();
        debug!("committed {}", self.final_path.display());
        Ok(())
    }

    /// Close and delete the artifact. Never fails.
    pub fn discard(mut self) {
        self.file.take();
        debug!("discarded {}", self.tmp_path.display());
    }
}
