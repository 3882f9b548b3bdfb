//! Conversion between host cells and Arrow arrays.
//!
//! Export packs one column of cells into the array type its storage type
//! maps to, turning sentinel-coded missing values into nulls. Import goes
//! the other way and additionally handles what foreign producers write:
//! dictionary columns, 1970-based dates and timestamps, raw bytes, and
//! types the host cannot represent.
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use arrow::{
    array::{
        Array, ArrayRef, AsArray, Float32Array, Float64Array, Int8Array, Int16Array, Int32Array,
        StringArray,
    },
    compute::{can_cast_types, cast},
    datatypes::{DataType, Float64Type, Int32Type, Int64Type, TimeUnit},
    error::ArrowError,
    util::display::{ArrayFormatter, FormatOptions},
};

use super::error::{CellKindSnafu, TransferResult};
use crate::{
    host::{Cell, ValueLabelSet, is_missing_number},
    types::{PhysicalType, StorageType},
};

/// Days between 1960-01-01 (host epoch) and 1970-01-01 (file epoch).
pub const DATE_EPOCH_SHIFT_DAYS: i64 = 3_653;

/// Milliseconds between 1960-01-01 (host epoch) and 1970-01-01 (file epoch).
pub const TIMESTAMP_EPOCH_SHIFT_MS: i64 = 315_619_200_000;

fn numbers(
    column: &str,
    storage: StorageType,
    cells: Vec<Cell>,
    sentinel: f64,
) -> TransferResult<Vec<Option<f64>>> {
    cells
        .into_iter()
        .map(|cell| match cell {
            Cell::Num(v) if is_missing_number(v, sentinel) => Ok(None),
            Cell::Num(v) => Ok(Some(v)),
            Cell::Str(_) => CellKindSnafu { column, storage }.fail(),
        })
        .collect()
}

/// Pack one column of host cells into the Arrow array for `storage`.
///
/// Numeric cells at or above `sentinel` become nulls. Text cells are never
/// null.
pub(crate) fn encode_column(
    column: &str,
    storage: StorageType,
    cells: Vec<Cell>,
    sentinel: f64,
) -> TransferResult<ArrayRef> {
    let array: ArrayRef = match storage {
        StorageType::Byte => {
            let values = numbers(column, storage, cells, sentinel)?;
            Arc::new(Int8Array::from_iter(values.into_iter().map(|v| v.map(|x| x as i8))))
        }
        StorageType::Int => {
            let values = numbers(column, storage, cells, sentinel)?;
            Arc::new(Int16Array::from_iter(values.into_iter().map(|v| v.map(|x| x as i16))))
        }
        StorageType::Long => {
            let values = numbers(column, storage, cells, sentinel)?;
            Arc::new(Int32Array::from_iter(values.into_iter().map(|v| v.map(|x| x as i32))))
        }
        StorageType::Float => {
            let values = numbers(column, storage, cells, sentinel)?;
            Arc::new(Float32Array::from_iter(values.into_iter().map(|v| v.map(|x| x as f32))))
        }
        StorageType::Double => {
            let values = numbers(column, storage, cells, sentinel)?;
            Arc::new(Float64Array::from_iter(values))
        }
        StorageType::Str(_) | StorageType::StrL => {
            let values = cells
                .into_iter()
                .map(|cell| match cell {
                    Cell::Str(s) => Ok(s),
                    Cell::Num(_) => CellKindSnafu { column, storage }.fail(),
                })
                .collect::<TransferResult<Vec<_>>>()?;
            Arc::new(StringArray::from_iter_values(values))
        }
    };
    Ok(array)
}

fn to_millis(value: i64, unit: TimeUnit) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000),
        TimeUnit::Millisecond => value,
        TimeUnit::Microsecond => value.div_euclid(1_000),
        TimeUnit::Nanosecond => value.div_euclid(1_000_000),
    }
}

fn numeric(array: &ArrayRef) -> Result<Vec<Option<Cell>>, ArrowError> {
    let floats = cast(array, &DataType::Float64)?;
    Ok(floats
        .as_primitive::<Float64Type>()
        .iter()
        .map(|v| v.map(Cell::Num))
        .collect())
}

fn temporal(
    array: &ArrayRef,
    physical: &PhysicalType,
    shift_epoch: bool,
) -> Result<Vec<Option<Cell>>, ArrowError> {
    let values: Vec<Option<i64>> = match physical {
        PhysicalType::Timestamp(unit) => {
            let raw = cast(array, &DataType::Int64)?;
            let shift = if shift_epoch { TIMESTAMP_EPOCH_SHIFT_MS } else { 0 };
            raw.as_primitive::<Int64Type>()
                .iter()
                .map(|v| v.map(|t| to_millis(t, *unit).saturating_add(shift)))
                .collect()
        }
        _ => {
            // Date64 carries milliseconds; Date32 is already whole days.
            let days = cast(array, &DataType::Date32)?;
            let raw = cast(&days, &DataType::Int32)?;
            let shift = if shift_epoch { DATE_EPOCH_SHIFT_DAYS } else { 0 };
            raw.as_primitive::<Int32Type>()
                .iter()
                .map(|v| v.map(|d| i64::from(d) + shift))
                .collect()
        }
    };
    Ok(values
        .into_iter()
        .map(|v| v.map(|x| Cell::Num(x as f64)))
        .collect())
}

/// Bytes decoded one character per byte, so every byte survives the trip
/// through host text storage.
fn latin1(array: &ArrayRef) -> Result<Vec<Option<Cell>>, ArrowError> {
    let bytes = cast(array, &DataType::Binary)?;
    Ok(bytes
        .as_binary::<i32>()
        .iter()
        .map(|v| v.map(|b| Cell::Str(b.iter().map(|&c| char::from(c)).collect())))
        .collect())
}

fn text(array: &ArrayRef) -> Result<Vec<Option<Cell>>, ArrowError> {
    if can_cast_types(array.data_type(), &DataType::Utf8) {
        let strings = cast(array, &DataType::Utf8)?;
        return Ok(strings
            .as_string::<i32>()
            .iter()
            .map(|v| v.map(|s| Cell::Str(s.to_string())))
            .collect());
    }

    let formatter = ArrayFormatter::try_new(array.as_ref(), &FormatOptions::default())?;
    Ok((0..array.len())
        .map(|i| (!array.is_null(i)).then(|| Cell::Str(formatter.value(i).to_string())))
        .collect())
}

/// Read one column of a batch as host values, before they are fitted to
/// the column's storage type.
///
/// Temporal columns are shifted to the host epoch when `shift_epoch` is
/// set. Dictionary columns with numeric storage go through
/// [`DictionaryCodes`] instead.
pub(crate) fn decode_column(
    array: &ArrayRef,
    physical: &PhysicalType,
    storage: StorageType,
    shift_epoch: bool,
) -> Result<Vec<Option<Cell>>, ArrowError> {
    match physical {
        PhysicalType::Binary => latin1(array),
        PhysicalType::Date | PhysicalType::Timestamp(_) if !storage.is_text() => {
            temporal(array, physical, shift_epoch)
        }
        PhysicalType::Int8
        | PhysicalType::Int16
        | PhysicalType::Int32
        | PhysicalType::Int64
        | PhysicalType::Float32
        | PhysicalType::Float64
            if !storage.is_text() =>
        {
            numeric(array)
        }
        _ => text(array),
    }
}

/// Stable integer codes for one dictionary-encoded column.
///
/// The first dictionary seen assigns each value its index as code. Later
/// batches carry their own dictionaries; their values are looked up by
/// text so a value keeps its code across batches, and unseen values get the
/// next free code.
#[derive(Debug, Default)]
pub(crate) struct DictionaryCodes {
    codes: HashMap<String, i64>,
    labels: BTreeMap<i64, String>,
    next: i64,
}

impl DictionaryCodes {
    fn code_for(&mut self, value: String, index: usize, first: bool) -> i64 {
        if let Some(&code) = self.codes.get(&value) {
            return code;
        }
        let code = if first { index as i64 } else { self.next };
        self.next = self.next.max(code + 1);
        self.labels.insert(code, value.clone());
        self.codes.insert(value, code);
        code
    }

    /// Decode a dictionary array into codes. Returns the cells and whether
    /// new labels were added.
    pub(crate) fn decode(
        &mut self,
        array: &ArrayRef,
    ) -> Result<(Vec<Option<Cell>>, bool), ArrowError> {
        let dict = array.as_any_dictionary_opt().ok_or_else(|| {
            ArrowError::InvalidArgumentError(format!(
                "expected a dictionary array, found {}",
                array.data_type()
            ))
        })?;

        let first = self.codes.is_empty();
        let known = self.labels.len();
        let mut remap = Vec::with_capacity(dict.values().len());
        for (index, value) in text(dict.values())?.into_iter().enumerate() {
            let code = match value {
                Some(Cell::Str(s)) => Some(self.code_for(s, index, first)),
                _ => None,
            };
            remap.push(code);
        }

        let keys = dict.normalized_keys();
        let cells = keys
            .iter()
            .enumerate()
            .map(|(row, &key)| {
                if array.is_null(row) {
                    None
                } else {
                    remap
                        .get(key)
                        .copied()
                        .flatten()
                        .map(|code| Cell::Num(code as f64))
                }
            })
            .collect();
        Ok((cells, self.labels.len() > known))
    }

    /// The accumulated value-label set, named after `column`.
    pub(crate) fn labels(&self, column: &str) -> ValueLabelSet {
        ValueLabelSet {
            name: column.to_string(),
            labels: self.labels.clone(),
        }
    }
}
