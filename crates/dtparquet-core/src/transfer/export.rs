//! Write path: host rows to a staged Parquet file.
use std::{
    fmt::Write as _,
    fs::File,
    mem,
    ops::Range,
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow::datatypes::SchemaRef;
use arrow_array::{RecordBatch, RecordBatchOptions};
use log::debug;
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use snafu::prelude::*;

use super::{
    cells::encode_column,
    error::{
        EncodeSnafu, HostSnafu, InvalidChunkSizeSnafu, SchemaMismatchSnafu, StorageSnafu,
        StreamClosedSnafu, TransferResult, WriteSnafu,
    },
};
use crate::{
    host::{Column, Host},
    metadata,
    options::ExportOptions,
    schema::{attach_document, build_schema},
    storage::StagedFile,
    types::StorageType,
};

fn describe(catalogue: &[(String, StorageType)]) -> String {
    let mut out = String::new();
    for (i, (name, storage)) in catalogue.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{name}:{storage}");
    }
    out
}

fn catalogue_of(columns: &[Column]) -> Vec<(String, StorageType)> {
    columns
        .iter()
        .map(|c| (c.name.clone(), c.storage))
        .collect()
}

struct BoundWriter {
    staged: StagedFile,
    writer: ArrowWriter<File>,
    schema: SchemaRef,
    catalogue: Vec<(String, StorageType)>,
}

enum ExportState {
    Uninitialized(StagedFile),
    Writing(Box<BoundWriter>),
    Closed,
    Aborted,
}

/// A single in-flight export to one destination path.
///
/// The stream stages everything in a temporary artifact next to the target
/// and only touches the target with the final rename in
/// [`ExportStream::finalize`]. The Parquet schema is bound lazily from the
/// host's catalogue on the first chunk; every later chunk must present the
/// same columns.
///
/// Any error from [`ExportStream::write_chunk`] or
/// [`ExportStream::finalize`] aborts the stream before it is returned.
/// Dropping a stream that was never finalized aborts it as well.
///
/// Callers must not run two streams against the same target at once.
pub struct ExportStream {
    target: PathBuf,
    options: ExportOptions,
    state: ExportState,
}

impl std::fmt::Debug for ExportStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            ExportState::Uninitialized(_) => "uninitialized",
            ExportState::Writing(_) => "writing",
            ExportState::Closed => "closed",
            ExportState::Aborted => "aborted",
        };
        f.debug_struct("ExportStream")
            .field("target", &self.target)
            .field("state", &state)
            .finish()
    }
}

impl ExportStream {
    /// Start an export to `target`, creating its directory if needed.
    pub fn init(target: impl AsRef<Path>, options: ExportOptions) -> TransferResult<Self> {
        ensure!(options.chunk_size > 0, InvalidChunkSizeSnafu);
        let target = target.as_ref().to_path_buf();
        let staged = StagedFile::create(&target).context(StorageSnafu {
            path: target.display().to_string(),
        })?;
        Ok(ExportStream {
            target,
            options,
            state: ExportState::Uninitialized(staged),
        })
    }

    /// Destination path.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Temporary artifact path while the stream is open.
    pub fn temp_path(&self) -> Option<&Path> {
        match &self.state {
            ExportState::Uninitialized(staged) => Some(staged.temp_path()),
            ExportState::Writing(bound) => Some(bound.staged.temp_path()),
            ExportState::Closed | ExportState::Aborted => None,
        }
    }

    /// True once the stream was finalized or aborted.
    pub fn is_closed(&self) -> bool {
        matches!(self.state, ExportState::Closed | ExportState::Aborted)
    }

    fn ensure_open(&self) -> TransferResult<()> {
        ensure!(!self.is_closed(), StreamClosedSnafu);
        Ok(())
    }

    /// Bind the schema on first use; later calls check the catalogue.
    fn bind<H: Host + ?Sized>(&mut self, host: &mut H) -> TransferResult<()> {
        let columns = host.columns().context(HostSnafu)?;
        let catalogue = catalogue_of(&columns);

        if let ExportState::Writing(bound) = &self.state {
            ensure!(
                bound.catalogue == catalogue,
                SchemaMismatchSnafu {
                    expected: describe(&bound.catalogue),
                    found: describe(&catalogue),
                }
            );
            return Ok(());
        }

        let ExportState::Uninitialized(staged) = mem::replace(&mut self.state, ExportState::Aborted)
        else {
            return StreamClosedSnafu.fail();
        };

        let mut schema = build_schema(&columns, self.options.preserve_labels);
        if self.options.preserve_labels {
            schema = attach_document(schema, &metadata::extract(host))?;
        }
        let schema = Arc::new(schema);

        let path = self.target.display().to_string();
        let sink = staged.writer().context(StorageSnafu { path: path.clone() })?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let writer = ArrowWriter::try_new(sink, Arc::clone(&schema), Some(props))
            .context(WriteSnafu { path })?;

        debug!(
            "bound export schema for {} ({} columns)",
            self.target.display(),
            catalogue.len()
        );
        self.state = ExportState::Writing(Box::new(BoundWriter {
            staged,
            writer,
            schema,
            catalogue,
        }));
        Ok(())
    }

    fn try_write_chunk<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        rows: Range<usize>,
    ) -> TransferResult<()> {
        self.bind(host)?;
        let ExportState::Writing(bound) = &mut self.state else {
            return StreamClosedSnafu.fail();
        };
        if rows.is_empty() {
            return Ok(());
        }

        let sentinel = host.missing_sentinel();
        let ncols = bound.catalogue.len();
        let nrows = rows.len();
        let table = host.read_cells(0..ncols, rows).context(HostSnafu)?;

        let mut columns = vec![Vec::with_capacity(nrows); ncols];
        for row in table {
            for (col, cell) in columns.iter_mut().zip(row) {
                col.push(cell);
            }
        }

        let arrays = bound
            .catalogue
            .iter()
            .zip(columns)
            .map(|((name, storage), cells)| encode_column(name, *storage, cells, sentinel))
            .collect::<TransferResult<Vec<_>>>()?;
        let batch = RecordBatch::try_new_with_options(
            Arc::clone(&bound.schema),
            arrays,
            &RecordBatchOptions::new().with_row_count(Some(nrows)),
        )
        .context(EncodeSnafu)?;

        bound.writer.write(&batch).context(WriteSnafu {
            path: self.target.display().to_string(),
        })?;
        debug!("wrote {nrows} rows to {}", self.target.display());
        Ok(())
    }

    /// Write `rows` of the host's current frame.
    ///
    /// The first call binds the schema (and, with labels preserved, embeds
    /// the metadata document). Later calls fail with
    /// [`SchemaMismatch`](super::TransferError::SchemaMismatch) if the
    /// host's catalogue has changed since.
    pub fn write_chunk<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        rows: Range<usize>,
    ) -> TransferResult<()> {
        self.ensure_open()?;
        let result = self.try_write_chunk(host, rows);
        if result.is_err() {
            self.abort();
        }
        result
    }

    fn try_finalize<H: Host + ?Sized>(&mut self, host: &mut H) -> TransferResult<()> {
        // A stream that never saw a chunk still produces a schema-only file.
        self.bind(host)?;
        let ExportState::Writing(bound) = mem::replace(&mut self.state, ExportState::Aborted)
        else {
            return StreamClosedSnafu.fail();
        };
        let BoundWriter { staged, writer, .. } = *bound;
        let path = self.target.display().to_string();

        writer.close().context(WriteSnafu { path: path.clone() })?;
        staged.commit().context(StorageSnafu { path })?;
        self.state = ExportState::Closed;
        Ok(())
    }

    /// Close the writer and atomically move the file into place.
    pub fn finalize<H: Host + ?Sized>(&mut self, host: &mut H) -> TransferResult<()> {
        self.ensure_open()?;
        let result = self.try_finalize(host);
        if result.is_err() {
            self.abort();
        }
        result
    }

    /// Drop the writer and delete the temporary artifact.
    ///
    /// Never fails and may be called repeatedly. A finalized stream is left
    /// alone.
    pub fn abort(&mut self) {
        match mem::replace(&mut self.state, ExportState::Aborted) {
            ExportState::Uninitialized(staged) => staged.discard(),
            ExportState::Writing(bound) => {
                let BoundWriter { staged, writer, .. } = *bound;
                drop(writer);
                staged.discard();
            }
            ExportState::Closed => {
                self.state = ExportState::Closed;
                return;
            }
            ExportState::Aborted => return,
        }
        debug!("aborted export to {}", self.target.display());
    }
}

impl Drop for ExportStream {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Export the host's current frame to `target` in `chunk_size` row chunks.
pub fn export_dataset<H: Host + ?Sized>(
    host: &mut H,
    target: impl AsRef<Path>,
    options: &ExportOptions,
) -> TransferResult<()> {
    let mut stream = ExportStream::init(target, options.clone())?;
    let nobs = host.observation_count();
    let mut start = 0;
    while start < nobs {
        let end = nobs.min(start + options.chunk_size);
        stream.write_chunk(host, start..end)?;
        start = end;
    }
    stream.finalize(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        host::{Cell, memory::MemoryHost},
        transfer::TransferError,
    };
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn small_host() -> Result<MemoryHost, Box<dyn std::error::Error>> {
        let mut host = MemoryHost::new();
        host.push_column("a", StorageType::Byte, "", vec![Cell::Num(1.0), Cell::Num(2.0)])?;
        Ok(host)
    }

    #[test]
    fn zero_chunk_size_is_rejected() -> TestResult {
        let dir = TempDir::new()?;
        let options = ExportOptions::default().chunk_size(0);
        let err =
            ExportStream::init(dir.path().join("x.parquet"), options).expect_err("chunk size");
        assert!(matches!(err, TransferError::InvalidChunkSize));
        Ok(())
    }

    #[test]
    fn chunks_after_finalize_are_refused() -> TestResult {
        let dir = TempDir::new()?;
        let mut host = small_host()?;
        let mut stream =
            ExportStream::init(dir.path().join("x.parquet"), ExportOptions::default())?;
        stream.write_chunk(&mut host, 0..2)?;
        stream.finalize(&mut host)?;
        assert!(stream.is_closed());

        let err = stream.write_chunk(&mut host, 0..1).expect_err("closed");
        assert!(matches!(err, TransferError::StreamClosed));
        stream.abort();
        assert!(dir.path().join("x.parquet").exists());
        Ok(())
    }

    #[test]
    fn changed_catalogue_is_a_schema_mismatch() -> TestResult {
        let dir = TempDir::new()?;
        let target = dir.path().join("x.parquet");
        let mut host = small_host()?;
        let mut stream = ExportStream::init(&target, ExportOptions::default())?;
        stream.write_chunk(&mut host, 0..1)?;
        let tmp = stream.temp_path().map(Path::to_path_buf);

        host.add_column(StorageType::Double, "b")?;
        let err = stream.write_chunk(&mut host, 1..2).expect_err("mismatch");
        assert!(matches!(err, TransferError::SchemaMismatch { .. }));
        assert!(stream.is_closed());
        assert!(!target.exists());
        assert!(tmp.is_some_and(|p| !p.exists()));
        Ok(())
    }

    #[test]
    fn dropping_an_open_stream_cleans_up() -> TestResult {
        let dir = TempDir::new()?;
        let mut host = small_host()?;
        let tmp = {
            let mut stream =
                ExportStream::init(dir.path().join("x.parquet"), ExportOptions::default())?;
            stream.write_chunk(&mut host, 0..2)?;
            stream.temp_path().map(Path::to_path_buf)
        };
        assert!(tmp.is_some_and(|p| !p.exists()));
        assert!(!dir.path().join("x.parquet").exists());
        Ok(())
    }

    #[test]
    fn abort_is_idempotent() -> TestResult {
        let dir = TempDir::new()?;
        let mut stream =
            ExportStream::init(dir.path().join("x.parquet"), ExportOptions::default())?;
        stream.abort();
        stream.abort();
        assert!(stream.is_closed());
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }
}
