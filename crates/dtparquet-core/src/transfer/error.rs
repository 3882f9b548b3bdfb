//! Error types for the export and import streams.

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use snafu::prelude::*;

use crate::{host::HostError, metadata::MetadataError, storage::StorageError, types::StorageType};

/// General result type for stream operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// Errors surfaced by [`ExportStream`](super::ExportStream) and
/// [`ImportStream`](super::ImportStream).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TransferError {
    /// Filesystem failure while staging, committing or opening a file.
    #[snafu(display("Storage error for {path}: {source}"))]
    Storage {
        /// Path being accessed.
        path: String,
        /// Underlying storage error.
        #[snafu(backtrace)]
        source: StorageError,
    },

    /// The file is not a readable Parquet file.
    #[snafu(display("Parquet read error for {path}: {source}"))]
    Format {
        /// Path of the file being read.
        path: String,
        /// Parquet error emitted by the reader.
        source: ParquetError,
    },

    /// A record batch could not be decoded from the file.
    #[snafu(display("Arrow read error for {path}: {source}"))]
    Decode {
        /// Path of the file being read.
        path: String,
        /// Arrow error emitted while decoding or converting batches.
        source: ArrowError,
    },

    /// The Parquet writer failed.
    #[snafu(display("Parquet write error for {path}: {source}"))]
    Write {
        /// Destination path of the export.
        path: String,
        /// Parquet error emitted by the writer.
        source: ParquetError,
    },

    /// A record batch could not be assembled from host cells.
    #[snafu(display("Failed to build record batch: {source}"))]
    Encode {
        /// Arrow error emitted while assembling the batch.
        source: ArrowError,
    },

    /// The file's metadata document needs a newer reader.
    #[snafu(display(
        "Metadata requires reader version {required}, this engine supports {supported}"
    ))]
    VersionMismatch {
        /// `min_reader_version` declared by the file.
        required: u32,
        /// Highest version this engine reads.
        supported: u32,
    },

    /// Any other metadata failure that could not be treated as soft.
    #[snafu(display("Metadata error: {source}"))]
    Metadata {
        /// Underlying metadata error.
        source: MetadataError,
    },

    /// A chunk's column catalogue differs from the one the stream was bound to.
    #[snafu(display("Column catalogue changed mid-export: bound [{expected}], found [{found}]"))]
    SchemaMismatch {
        /// Catalogue the schema was bound with.
        expected: String,
        /// Catalogue presented by the host now.
        found: String,
    },

    /// The stream was already finalized or aborted.
    #[snafu(display("Stream is closed"))]
    StreamClosed,

    /// A chunk size of zero was requested.
    #[snafu(display("Chunk size must be at least 1"))]
    InvalidChunkSize,

    /// A requested column does not exist in the file.
    #[snafu(display("Column {column} not found in {path}"))]
    UnknownColumn {
        /// Path of the file being read.
        path: String,
        /// The requested name.
        column: String,
    },

    /// The file's selected fields repeat a name, which the host cannot hold.
    #[snafu(display("Column {column} appears more than once in {path}"))]
    DuplicateColumn {
        /// Path of the file being read.
        path: String,
        /// The repeated name.
        column: String,
    },

    /// The host returned a cell whose kind does not match the column's
    /// storage type.
    #[snafu(display("Column {column} declared {storage} holds a cell of the wrong kind"))]
    CellKind {
        /// Column name.
        column: String,
        /// Declared storage type.
        storage: StorageType,
    },

    /// The host rejected an operation.
    #[snafu(display("Host error: {source}"))]
    Host {
        /// Underlying host error.
        source: HostError,
    },
}

impl From<MetadataError> for TransferError {
    /// The version guard stays distinguishable from every other metadata
    /// failure.
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::VersionMismatch {
                required,
                supported,
            } => TransferError::VersionMismatch {
                required,
                supported,
            },
            source => TransferError::Metadata { source },
        }
    }
}
