//! # dtparquet
//!
//! Save and load statistical host datasets as Parquet, keeping variable
//! labels, text widths, notes and value labels.
//!
//! This crate is the supported public entry point and provides a small,
//! stable surface over `dtparquet-core`.
//!
//! ## Example
//!
//! ```rust
//! use dtparquet::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = std::env::temp_dir().join("dtparquet-doc");
//! let path = dir.join("auto.parquet");
//!
//! let mut host = MemoryHost::new();
//! host.push_column("price", StorageType::Int, "Price", vec![Cell::Num(4099.0)])?;
//! save(&mut host, &path, &ExportOptions::default())?;
//!
//! let mut loaded = MemoryHost::new();
//! let rows = load(&mut loaded, &path, &ImportOptions::default())?;
//! assert_eq!(rows, 1);
//! assert_eq!(loaded.column_label(0)?, "Price");
//! # std::fs::remove_dir_all(&dir)?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

/// Convenience prelude with the stable, supported surface.
pub mod prelude;

/// Host adapter namespace.
pub mod host {
    pub use dtparquet_core::host::memory::{DEFAULT_MISSING, MemoryHost};
    pub use dtparquet_core::host::{
        Cell, Column, FrameGuard, Host, HostError, HostResult, ValueLabelSet,
    };
}

/// Metadata document namespace.
pub mod metadata {
    pub use dtparquet_core::metadata::{
        DatasetMetadataDocument, FRAME_INFO, FRAME_LABELS, FRAME_NOTES, FRAME_VARS,
        FrameSnapshot, METADATA_KEY, MetadataError, READER_VERSION, SCHEMA_VERSION,
        TypeOverrides, apply, apply_document, extract,
    };
}

pub use dtparquet_core::options::{DEFAULT_CHUNK_SIZE, ExportOptions, ImportOptions, SweepOptions};
pub use dtparquet_core::schema::{LABEL_KEY, TYPE_KEY};
pub use dtparquet_core::storage::sweep::{SweepReport, sweep_orphaned_temp_files};
pub use dtparquet_core::transfer::{
    ExportStream, ImportStream, TransferError, TransferResult, export_dataset, import_dataset,
};
pub use dtparquet_core::types::{StorageType, TypePolicy, WideIntegerPolicy};

/// Write the host's current dataset to `path`.
///
/// The file appears atomically: either the complete new file is in place
/// afterwards or `path` is untouched and no temporary artifact remains.
pub fn save<H: host::Host + ?Sized>(
    host: &mut H,
    path: impl AsRef<Path>,
    options: &ExportOptions,
) -> TransferResult<()> {
    export_dataset(host, path, options)
}

/// Replace the host's current dataset with the contents of `path`.
///
/// Returns the number of rows loaded.
pub fn load<H: host::Host + ?Sized>(
    host: &mut H,
    path: impl AsRef<Path>,
    options: &ImportOptions,
) -> TransferResult<usize> {
    import_dataset(host, path, options)
}

/// Remove temporary artifacts left behind by crashed exports, looking in
/// the process's working directory tree and its temp directory.
pub fn cleanup_orphaned_temp_files() -> SweepReport {
    sweep_orphaned_temp_files(&SweepOptions::from_env())
}
