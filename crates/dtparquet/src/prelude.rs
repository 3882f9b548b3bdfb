//! Wrapper prelude.
//!
//! The `dtparquet` crate is the supported public entry point. Downstream
//! code should prefer importing from this prelude instead of depending on
//! `dtparquet-core` module paths.

pub use crate::host::{Cell, Column, Host, MemoryHost, ValueLabelSet};
pub use crate::{
    ExportOptions, ExportStream, ImportOptions, ImportStream, StorageType, SweepOptions,
    SweepReport, TransferError, TypePolicy, WideIntegerPolicy, cleanup_orphaned_temp_files, load,
    save,
};
