//! Caller-facing configuration for exports, imports and the orphan sweep.
//!
//! All option structs implement `Default` and (de)serialize with `serde`, so
//! a host bridge can pass them across as JSON; missing fields take their
//! defaults.
use std::{env, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::TypePolicy;

/// Rows per chunk when the caller does not choose one.
pub const DEFAULT_CHUNK_SIZE: usize = 50_000;

fn default_true() -> bool {
    true
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// Options for writing the host's primary dataset to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Carry labels, notes and the metadata frames into the file. When
    /// false, no field-level or schema-level metadata is written at all.
    #[serde(default = "default_true")]
    pub preserve_labels: bool,
    /// Rows read from the host per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            preserve_labels: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ExportOptions {
    /// Builder-style setter for [`ExportOptions::preserve_labels`].
    pub fn preserve_labels(mut self, preserve: bool) -> Self {
        self.preserve_labels = preserve;
        self
    }

    /// Builder-style setter for [`ExportOptions::chunk_size`].
    pub fn chunk_size(mut self, rows: usize) -> Self {
        self.chunk_size = rows;
        self
    }
}

/// Options for loading a file into the host's primary dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Load only these columns (file order is kept). `None` loads all.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    /// Restore labels, value labels and metadata frames. When false,
    /// column labels are forced empty even if the file carries them.
    #[serde(default = "default_true")]
    pub preserve_labels: bool,
    /// Rows decoded per batch.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Physical -> storage type policy.
    #[serde(default)]
    pub policy: TypePolicy,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            columns: None,
            preserve_labels: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            policy: TypePolicy::default(),
        }
    }
}

impl ImportOptions {
    /// Builder-style setter for [`ImportOptions::columns`].
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Builder-style setter for [`ImportOptions::preserve_labels`].
    pub fn preserve_labels(mut self, preserve: bool) -> Self {
        self.preserve_labels = preserve;
        self
    }

    /// Builder-style setter for [`ImportOptions::chunk_size`].
    pub fn chunk_size(mut self, rows: usize) -> Self {
        self.chunk_size = rows;
        self
    }

    /// Builder-style setter for [`ImportOptions::policy`].
    pub fn policy(mut self, policy: TypePolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Where the orphan sweep looks for temporary artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepOptions {
    /// Working directory tree to search.
    pub work_dir: PathBuf,
    /// Temp directory searched at its top level only.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
    /// Descend into subdirectories of `work_dir`.
    #[serde(default = "default_true")]
    pub recursive_work_dir: bool,
}

impl SweepOptions {
    /// Resolve the sweep locations from the process environment.
    ///
    /// The work directory is the current directory (`.` if it cannot be
    /// determined); the temp directory comes from `TEMP`, then `TMP`,
    /// then falls back to `.`.
    pub fn from_env() -> Self {
        let work_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let temp_dir = env::var_os("TEMP")
            .or_else(|| env::var_os("TMP"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        SweepOptions {
            work_dir,
            temp_dir: Some(temp_dir),
            recursive_work_dir: true,
        }
    }
}
