#![allow(dead_code)]

use std::{fs::File, ops::Range, path::Path, sync::Arc};

use arrow::{
    array::ArrayRef,
    datatypes::{Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use dtparquet_core::{
    host::{
        Cell, Column, Host, HostError, HostResult, ValueLabelSet, memory::MemoryHost,
    },
    metadata::FRAME_NOTES,
    types::StorageType,
};
use parquet::arrow::{ArrowWriter, arrow_reader::ParquetRecordBatchReaderBuilder};

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Host state as a comparable value: catalogue plus every cell.
pub fn snapshot(host: &MemoryHost) -> TestResult<(Vec<Column>, Vec<Vec<Cell>>)> {
    let columns = host.columns()?;
    let cells = (0..columns.len())
        .map(|i| host.column_cells(i).map(<[Cell]>::to_vec))
        .collect::<HostResult<Vec<_>>>()?;
    Ok((columns, cells))
}

/// One column of every storage type, with missing values and labels.
pub fn every_type_host() -> TestResult<MemoryHost> {
    let mut host = MemoryHost::new();
    let m = host.missing_sentinel();
    host.push_column(
        "b",
        StorageType::Byte,
        "tiny",
        vec![Cell::Num(1.0), Cell::Num(-5.0), Cell::Num(m)],
    )?;
    host.push_column(
        "i",
        StorageType::Int,
        "",
        vec![Cell::Num(300.0), Cell::Num(m), Cell::Num(-2.0)],
    )?;
    host.push_column(
        "l",
        StorageType::Long,
        "count",
        vec![Cell::Num(100_000.0), Cell::Num(7.0), Cell::Num(m)],
    )?;
    host.push_column(
        "f",
        StorageType::Float,
        "",
        vec![Cell::Num(1.5), Cell::Num(m), Cell::Num(-0.25)],
    )?;
    host.push_column(
        "d",
        StorageType::Double,
        "ratio",
        vec![Cell::Num(3.141_59), Cell::Num(1.0e300), Cell::Num(m)],
    )?;
    host.push_column(
        "s",
        StorageType::Str(4),
        "short text",
        vec![
            Cell::Str("ab".into()),
            Cell::Str(String::new()),
            Cell::Str("wxyz".into()),
        ],
    )?;
    host.push_column(
        "sl",
        StorageType::StrL,
        "",
        vec![
            Cell::Str("a much longer piece of text".into()),
            Cell::Str("\u{e9}t\u{e9}".into()),
            Cell::Str(String::new()),
        ],
    )?;
    Ok(host)
}

/// Add a two-row notes frame to `host`, leaving the current frame alone.
pub fn add_notes(host: &mut MemoryHost) -> TestResult {
    let current = host.current_frame();
    host.create_frame(FRAME_NOTES)?;
    host.set_current_frame(FRAME_NOTES)?;
    host.push_column(
        "varname",
        StorageType::Str(8),
        "",
        vec![Cell::Str("_dta".into()), Cell::Str("d".into())],
    )?;
    host.push_column(
        "note",
        StorageType::StrL,
        "",
        vec![
            Cell::Str("Collected in 1978".into()),
            Cell::Str("Ratio of two prices".into()),
        ],
    )?;
    host.set_current_frame(&current)?;
    Ok(())
}

/// Write a single-batch Parquet file the way a foreign producer would.
pub fn write_foreign(path: &Path, columns: Vec<(&str, ArrayRef)>) -> TestResult {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect();
    write_batch(path, Schema::new(fields), columns.into_iter().map(|(_, a)| a).collect())
}

/// Write one batch under an explicit schema.
pub fn write_batch(path: &Path, schema: Schema, arrays: Vec<ArrayRef>) -> TestResult {
    let schema = Arc::new(schema);
    let batch = RecordBatch::try_new(Arc::clone(&schema), arrays)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// The Arrow schema stored in a Parquet file.
pub fn file_schema(path: &Path) -> TestResult<SchemaRef> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    Ok(builder.schema().clone())
}

/// Names of the entries of `dir`.
pub fn dir_entries(dir: &Path) -> TestResult<Vec<String>> {
    let mut names = std::fs::read_dir(dir)?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<Vec<_>, _>>()?;
    names.sort();
    Ok(names)
}

/// A host whose cell reads start failing at a given row.
pub struct FlakyHost {
    pub inner: MemoryHost,
    pub fail_from_row: usize,
}

impl Host for FlakyHost {
    fn column_count(&self) -> usize {
        self.inner.column_count()
    }

    fn column_name(&self, index: usize) -> HostResult<String> {
        self.inner.column_name(index)
    }

    fn column_storage_type(&self, index: usize) -> HostResult<StorageType> {
        self.inner.column_storage_type(index)
    }

    fn column_label(&self, index: usize) -> HostResult<String> {
        self.inner.column_label(index)
    }

    fn set_column_label(&mut self, index: usize, label: &str) -> HostResult<()> {
        self.inner.set_column_label(index, label)
    }

    fn observation_count(&self) -> usize {
        self.inner.observation_count()
    }

    fn add_observations(&mut self, n: usize) -> HostResult<()> {
        self.inner.add_observations(n)
    }

    fn keep_observations(&mut self, n: usize) -> HostResult<()> {
        self.inner.keep_observations(n)
    }

    fn drop_all_columns(&mut self) -> HostResult<()> {
        self.inner.drop_all_columns()
    }

    fn add_column(&mut self, storage: StorageType, name: &str) -> HostResult<()> {
        self.inner.add_column(storage, name)
    }

    fn missing_sentinel(&self) -> f64 {
        self.inner.missing_sentinel()
    }

    fn read_cells(&self, columns: Range<usize>, rows: Range<usize>) -> HostResult<Vec<Vec<Cell>>> {
        if rows.end > self.fail_from_row {
            return Err(HostError::Backend {
                message: "simulated read failure".into(),
            });
        }
        self.inner.read_cells(columns, rows)
    }

    fn write_cells(
        &mut self,
        column: usize,
        rows: Range<usize>,
        values: Vec<Cell>,
    ) -> HostResult<()> {
        self.inner.write_cells(column, rows, values)
    }

    fn set_value_labels(&mut self, column: usize, labels: ValueLabelSet) -> HostResult<()> {
        self.inner.set_value_labels(column, labels)
    }

    fn frame_names(&self) -> Vec<String> {
        self.inner.frame_names()
    }

    fn current_frame(&self) -> String {
        self.inner.current_frame()
    }

    fn set_current_frame(&mut self, name: &str) -> HostResult<()> {
        self.inner.set_current_frame(name)
    }

    fn create_frame(&mut self, name: &str) -> HostResult<()> {
        self.inner.create_frame(name)
    }

    fn drop_frame(&mut self, name: &str) -> HostResult<()> {
        self.inner.drop_frame(name)
    }
}
