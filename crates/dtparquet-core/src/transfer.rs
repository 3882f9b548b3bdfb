//! Chunked streaming between the host and Parquet files.
//!
//! The write path ([`ExportStream`]) reads bounded row ranges from the host,
//! translates the missing-value sentinel into nulls and appends record
//! batches to a staged file that is renamed into place on
//! [`ExportStream::finalize`]. The read path ([`ImportStream`]) decodes the
//! file batch by batch, expanding dictionaries into coded values with value
//! labels and moving foreign dates and timestamps onto the host epoch.
//!
//! [`export_dataset`] and [`import_dataset`] drive a whole transfer.

pub mod cells;
pub mod error;
pub mod export;
pub mod import;

pub use cells::{DATE_EPOCH_SHIFT_DAYS, TIMESTAMP_EPOCH_SHIFT_MS};
pub use error::{TransferError, TransferResult};
pub use export::{ExportStream, export_dataset};
pub use import::{ImportStream, import_dataset};
