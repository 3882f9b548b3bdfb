//! Removal of temporary artifacts orphaned by crashed exports.
//!
//! A process killed between staging and commit leaves `*.parquet.tmp`
//! files behind. The sweep looks for them under a working directory tree
//! and directly inside a temp directory and deletes what it finds. It is
//! strictly best-effort: unreadable directories and failed deletions are
//! logged and counted, never returned as errors.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, warn};

use super::TEMP_SUFFIX;
use crate::options::SweepOptions;

/// Outcome of a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Artifacts deleted.
    pub removed: usize,
    /// Artifacts found but not deleted.
    pub failed: usize,
}

fn is_temp_artifact(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(TEMP_SUFFIX))
}

fn collect(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("skipping {}: {e}", dir.display());
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if recursive {
                collect(&path, true, out);
            }
        } else if file_type.is_file() && is_temp_artifact(&path) {
            out.push(path);
        }
    }
}

/// Delete orphaned `*.parquet.tmp` artifacts.
///
/// The work directory is searched recursively when
/// [`SweepOptions::recursive_work_dir`] is set; the temp directory is only
/// searched at its top level. Symlinked directories are not followed.
pub fn sweep_orphaned_temp_files(options: &SweepOptions) -> SweepReport {
    let mut found = Vec::new();
    collect(&options.work_dir, options.recursive_work_dir, &mut found);
    if let Some(temp_dir) = &options.temp_dir {
        collect(temp_dir, false, &mut found);
    }
    found.sort();
    found.dedup();

    let mut report = SweepReport::default();
    for path in found {
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("removed orphaned {}", path.display());
                report.removed += 1;
            }
            Err(e) => {
                warn!("could not remove orphaned {}: {e}", path.display());
                report.failed += 1;
            }
        }
    }
    report
}
