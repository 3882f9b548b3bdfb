//! Read path: a Parquet file into the host's current frame.
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use arrow::datatypes::Field;
use log::{debug, warn};
use parquet::arrow::{
    ProjectionMask,
    arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder},
};
use snafu::prelude::*;

use super::{
    cells::{DictionaryCodes, decode_column},
    error::{
        DecodeSnafu, DuplicateColumnSnafu, FormatSnafu, HostSnafu, InvalidChunkSizeSnafu,
        StorageSnafu, TransferResult, UnknownColumnSnafu,
    },
};
use crate::{
    host::{Host, fit_cell},
    metadata::{self, TypeOverrides},
    options::ImportOptions,
    schema::{document_json, field_label, field_storage_type, is_native},
    storage::open_for_read,
    types::{PhysicalType, StorageType, TypePolicy, from_physical},
};

/// How one file column lands in the host.
#[derive(Debug)]
struct ColumnPlan {
    name: String,
    physical: PhysicalType,
    storage: StorageType,
    codes: Option<DictionaryCodes>,
}

/// Storage type for `field`: catalogue override, then the field's own
/// annotation (text fields only), then inference.
fn resolve_storage(
    field: &Field,
    physical: &PhysicalType,
    overrides: &TypeOverrides,
    policy: &TypePolicy,
) -> StorageType {
    if let Some(storage) = overrides.get(field.name()) {
        return *storage;
    }
    if matches!(physical, PhysicalType::Utf8 | PhysicalType::Binary) {
        if let Some(storage) = field_storage_type(field) {
            return storage;
        }
    }
    from_physical(physical, policy)
}

/// An import in progress.
///
/// [`ImportStream::open`] validates the file and allocates the host
/// columns; each [`ImportStream::next_chunk`] then decodes one batch of at
/// most `chunk_size` rows and writes it at the next row offset. The final
/// host state does not depend on the chunk size.
pub struct ImportStream {
    path: PathBuf,
    reader: ParquetRecordBatchReader,
    plans: Vec<ColumnPlan>,
    foreign: bool,
    preserve_labels: bool,
    offset: usize,
    total_rows: usize,
}

impl std::fmt::Debug for ImportStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportStream")
            .field("path", &self.path)
            .field("plans", &self.plans)
            .field("foreign", &self.foreign)
            .field("offset", &self.offset)
            .field("total_rows", &self.total_rows)
            .finish()
    }
}

impl ImportStream {
    /// Open `path` and prepare the host for its rows.
    ///
    /// Everything that can reject the file (opening it, the projection,
    /// repeated field names, the metadata version guard) is checked before the host's current frame
    /// is cleared. The frame is then reset to the file's row count and one
    /// column is allocated per selected field.
    pub fn open<H: Host + ?Sized>(
        host: &mut H,
        path: impl AsRef<Path>,
        options: &ImportOptions,
    ) -> TransferResult<Self> {
        ensure!(options.chunk_size > 0, InvalidChunkSizeSnafu);
        let path = path.as_ref().to_path_buf();
        let path_str = path.display().to_string();

        let file = open_for_read(&path).context(StorageSnafu {
            path: path_str.clone(),
        })?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file).context(FormatSnafu {
            path: path_str.clone(),
        })?;
        let schema = builder.schema().clone();
        let total_rows =
            usize::try_from(builder.metadata().file_metadata().num_rows()).unwrap_or(0);

        let selected: Vec<usize> = match &options.columns {
            Some(requested) => {
                for name in requested {
                    ensure!(
                        schema.column_with_name(name).is_some(),
                        UnknownColumnSnafu {
                            path: path_str.clone(),
                            column: name.as_str(),
                        }
                    );
                }
                let wanted: HashSet<&str> = requested.iter().map(String::as_str).collect();
                schema
                    .fields()
                    .iter()
                    .enumerate()
                    .filter(|(_, f)| wanted.contains(f.name().as_str()))
                    .map(|(i, _)| i)
                    .collect()
            }
            None => (0..schema.fields().len()).collect(),
        };

        let mut seen = HashSet::new();
        for &i in &selected {
            let name = schema.field(i).name();
            ensure!(
                seen.insert(name.as_str()),
                DuplicateColumnSnafu {
                    path: path_str.clone(),
                    column: name.as_str(),
                }
            );
        }

        let mask = ProjectionMask::roots(builder.parquet_schema(), selected.iter().copied());
        let reader = builder
            .with_projection(mask)
            .with_batch_size(options.chunk_size)
            .build()
            .context(FormatSnafu {
                path: path_str.clone(),
            })?;

        let foreign = !is_native(&schema);
        let overrides = if options.preserve_labels {
            metadata::apply(host, document_json(&schema))?
        } else {
            TypeOverrides::new()
        };

        host.drop_all_columns().context(HostSnafu)?;
        let nobs = host.observation_count();
        if nobs > total_rows {
            host.keep_observations(total_rows).context(HostSnafu)?;
        } else if nobs < total_rows {
            host.add_observations(total_rows - nobs).context(HostSnafu)?;
        }

        let mut plans = Vec::with_capacity(selected.len());
        for (index, &field_index) in selected.iter().enumerate() {
            let field = schema.field(field_index);
            let physical = PhysicalType::from_arrow(field.data_type());
            let storage = resolve_storage(field, &physical, &overrides, &options.policy);

            host.add_column(storage, field.name()).context(HostSnafu)?;
            let label = if options.preserve_labels {
                field_label(field).unwrap_or_default()
            } else {
                ""
            };
            host.set_column_label(index, label).context(HostSnafu)?;

            let codes = (matches!(physical, PhysicalType::Dictionary(_)) && !storage.is_text())
                .then(DictionaryCodes::default);
            plans.push(ColumnPlan {
                name: field.name().clone(),
                physical,
                storage,
                codes,
            });
        }

        debug!(
            "importing {} rows, {} columns from {} ({})",
            total_rows,
            plans.len(),
            path_str,
            if foreign { "foreign" } else { "native" }
        );
        Ok(ImportStream {
            path,
            reader,
            plans,
            foreign,
            preserve_labels: options.preserve_labels,
            offset: 0,
            total_rows,
        })
    }

    /// Rows the file holds.
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    /// Rows written into the host so far.
    pub fn rows_written(&self) -> usize {
        self.offset
    }

    /// Whether the file was written by a foreign producer.
    pub fn is_foreign(&self) -> bool {
        self.foreign
    }

    /// Decode the next batch into the host.
    ///
    /// Returns the number of rows written, or `None` once the file is
    /// exhausted.
    pub fn next_chunk<H: Host + ?Sized>(&mut self, host: &mut H) -> TransferResult<Option<usize>> {
        let path = self.path.display().to_string();
        let batch = match self.reader.next() {
            None => {
                debug!("finished {path} after {} rows", self.offset);
                return Ok(None);
            }
            Some(batch) => batch.context(DecodeSnafu { path: path.clone() })?,
        };

        let nrows = batch.num_rows();
        let rows = self.offset..self.offset + nrows;
        let sentinel = host.missing_sentinel();

        for (index, (plan, array)) in self.plans.iter_mut().zip(batch.columns()).enumerate() {
            let (values, grew) = match plan.codes.as_mut() {
                Some(codes) => codes.decode(array).context(DecodeSnafu { path: path.clone() })?,
                None => {
                    let shift = self.foreign && plan.physical.is_temporal();
                    let values = decode_column(array, &plan.physical, plan.storage, shift)
                        .context(DecodeSnafu { path: path.clone() })?;
                    (values, false)
                }
            };

            let cells = values
                .into_iter()
                .map(|v| fit_cell(v, plan.storage, sentinel))
                .collect();
            host.write_cells(index, rows.clone(), cells).context(HostSnafu)?;

            if grew && self.preserve_labels && !self.foreign {
                if let Some(codes) = &plan.codes {
                    if let Err(e) = host.set_value_labels(index, codes.labels(&plan.name)) {
                        warn!("value labels for {} not attached: {e}", plan.name);
                    }
                }
            }
        }

        self.offset += nrows;
        debug!("read {nrows} rows from {path} (offset {})", self.offset);
        Ok(Some(nrows))
    }
}

/// Load `path` into the host's current frame.
///
/// Returns the number of rows loaded.
pub fn import_dataset<H: Host + ?Sized>(
    host: &mut H,
    path: impl AsRef<Path>,
    options: &ImportOptions,
) -> TransferResult<usize> {
    let mut stream = ImportStream::open(host, path, options)?;
    while stream.next_chunk(host)?.is_some() {}
    Ok(stream.rows_written())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::host::memory::MemoryHost;
    use arrow::datatypes::DataType;

    #[test]
    fn storage_resolution_prefers_overrides_then_annotations() {
        let policy = TypePolicy::default();
        let text = Field::new("make", DataType::Utf8, true).with_metadata(HashMap::from([(
            crate::schema::TYPE_KEY.to_string(),
            "str18".to_string(),
        )]));

        let none = TypeOverrides::new();
        assert_eq!(
            resolve_storage(&text, &PhysicalType::Utf8, &none, &policy),
            StorageType::Str(18)
        );

        let overrides = TypeOverrides::from([("make".to_string(), StorageType::Str(4))]);
        assert_eq!(
            resolve_storage(&text, &PhysicalType::Utf8, &overrides, &policy),
            StorageType::Str(4)
        );

        let plain = Field::new("n", DataType::Int64, true);
        assert_eq!(
            resolve_storage(&plain, &PhysicalType::Int64, &none, &policy),
            StorageType::Double
        );
        assert_eq!(
            resolve_storage(
                &plain,
                &PhysicalType::Int64,
                &none,
                &TypePolicy::wide_integers_as_text()
            ),
            StorageType::StrL
        );
    }

    #[test]
    fn missing_file_is_a_storage_error() {
        let mut host = MemoryHost::new();
        let err = ImportStream::open(&mut host, "/no/such/file.parquet", &ImportOptions::default())
            .expect_err("missing");
        assert!(matches!(err, crate::transfer::TransferError::Storage { .. }));
    }
}
