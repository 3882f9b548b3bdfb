//! The narrow surface the engine needs from the host statistical environment.
//!
//! The engine never talks to a live host directly. Everything goes through
//! the [`Host`] trait: column catalogue inspection, cell reads/writes,
//! observation management, and the "current frame" context used to reach
//! the auxiliary metadata frames.
//!
//! Frame switching is always scoped through [`FrameGuard`], which restores
//! the previously current frame on every exit path, including early returns
//! and `?` propagation.
use std::{
    collections::BTreeMap,
    ops::{Deref, DerefMut, Range},
};

use log::warn;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::types::StorageType;

pub mod memory;

/// Result alias for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Errors raised by a [`Host`] implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum HostError {
    /// Column index outside the current frame's catalogue.
    #[snafu(display("Column index {index} out of range (frame has {count} columns)"))]
    ColumnOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of columns in the frame.
        count: usize,
    },

    /// Row range outside the current frame's observations.
    #[snafu(display("Rows {start}..{end} out of range (frame has {count} observations)"))]
    RowsOutOfRange {
        /// Start of the requested range.
        start: usize,
        /// End of the requested range.
        end: usize,
        /// Number of observations in the frame.
        count: usize,
    },

    /// A column with this name already exists in the frame.
    #[snafu(display("Column {name} already exists"))]
    DuplicateColumn {
        /// The duplicated column name.
        name: String,
    },

    /// No frame with this name exists.
    #[snafu(display("Frame {name} does not exist"))]
    UnknownFrame {
        /// The missing frame name.
        name: String,
    },

    /// A frame with this name already exists.
    #[snafu(display("Frame {name} already exists"))]
    FrameExists {
        /// The duplicated frame name.
        name: String,
    },

    /// A text cell was written to a numeric column or vice versa.
    #[snafu(display("Cell kind does not match storage type {storage} of column {column}"))]
    CellKind {
        /// Column name.
        column: String,
        /// Declared storage type of the column.
        storage: StorageType,
    },

    /// The number of values does not match the target row range.
    #[snafu(display("Expected {expected} values for column {column}, got {actual}"))]
    ValueCount {
        /// Column name.
        column: String,
        /// Rows in the target range.
        expected: usize,
        /// Values supplied.
        actual: usize,
    },

    /// Any other failure reported by the host itself.
    #[snafu(display("Host error: {message}"))]
    Backend {
        /// Host-provided description.
        message: String,
    },
}

/// A single cell value as seen by the host.
///
/// Numeric columns always hold `Num`, text columns always hold `Str`.
/// Missing numeric values are represented by the host's sentinel (see
/// [`Host::missing_sentinel`]), not by a separate variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// A numeric value, possibly the missing sentinel.
    Num(f64),
    /// A text value.
    Str(String),
}

impl Cell {
    /// True when this is a numeric missing value under `sentinel`.
    ///
    /// Extended missing codes sort above the system missing value, so
    /// anything at or above the sentinel (and NaN) counts as missing.
    pub fn is_missing(&self, sentinel: f64) -> bool {
        match self {
            Cell::Num(v) => is_missing_number(*v, sentinel),
            Cell::Str(_) => false,
        }
    }
}

/// Numeric missing-value test shared by the read and write paths.
pub fn is_missing_number(value: f64, sentinel: f64) -> bool {
    value.is_nan() || value >= sentinel
}

/// Turn a possibly-absent value into a cell that fits `storage`.
///
/// Absent values become the sentinel (numeric) or the empty string (text).
/// Numbers headed for text columns are formatted; text headed for numeric
/// columns is parsed, and becomes missing when it is not a number. The host
/// has no NaN or infinity, so non-finite numbers become missing as well.
pub fn fit_cell(value: Option<Cell>, storage: StorageType, sentinel: f64) -> Cell {
    let finite_or_missing = |v: f64| if v.is_finite() { v } else { sentinel };
    match (value, storage.is_text()) {
        (None, true) => Cell::Str(String::new()),
        (None, false) => Cell::Num(sentinel),
        (Some(Cell::Str(s)), true) => Cell::Str(s),
        (Some(Cell::Num(v)), false) => Cell::Num(finite_or_missing(v)),
        (Some(Cell::Num(v)), true) => Cell::Str(v.to_string()),
        (Some(Cell::Str(s)), false) => {
            Cell::Num(s.trim().parse().map_or(sentinel, finite_or_missing))
        }
    }
}

/// Categorical value labels (integer code -> text) attached to a column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueLabelSet {
    /// Name of the label set; the engine uses the column name.
    pub name: String,
    /// Code to label mapping, ordered by code.
    pub labels: BTreeMap<i64, String>,
}

/// Operations the engine needs from the host.
///
/// All column and row operations apply to the *current* frame.
pub trait Host {
    /// Number of columns in the current frame.
    fn column_count(&self) -> usize;

    /// Name of column `index`.
    fn column_name(&self, index: usize) -> HostResult<String>;

    /// Declared storage type of column `index`.
    fn column_storage_type(&self, index: usize) -> HostResult<StorageType>;

    /// Human-readable label of column `index` (empty when unset).
    fn column_label(&self, index: usize) -> HostResult<String>;

    /// Replace the label of column `index`.
    fn set_column_label(&mut self, index: usize, label: &str) -> HostResult<()>;

    /// Number of observations in the current frame.
    fn observation_count(&self) -> usize;

    /// Append `n` observations, filling every column with its empty value.
    fn add_observations(&mut self, n: usize) -> HostResult<()>;

    /// Keep only the first `n` observations.
    fn keep_observations(&mut self, n: usize) -> HostResult<()>;

    /// Remove every column of the current frame.
    fn drop_all_columns(&mut self) -> HostResult<()>;

    /// Append a new column at the end of the catalogue.
    fn add_column(&mut self, storage: StorageType, name: &str) -> HostResult<()>;

    /// The host's numeric missing-value sentinel.
    fn missing_sentinel(&self) -> f64;

    /// Read a rectangle of cells, returned row-major.
    fn read_cells(&self, columns: Range<usize>, rows: Range<usize>) -> HostResult<Vec<Vec<Cell>>>;

    /// Write `values` into column `column` over `rows`.
    fn write_cells(&mut self, column: usize, rows: Range<usize>, values: Vec<Cell>)
    -> HostResult<()>;

    /// Attach a value-label set to column `column`.
    fn set_value_labels(&mut self, column: usize, labels: ValueLabelSet) -> HostResult<()>;

    /// Names of all frames, including the current one.
    fn frame_names(&self) -> Vec<String>;

    /// Name of the current frame.
    fn current_frame(&self) -> String;

    /// Make `name` the current frame.
    fn set_current_frame(&mut self, name: &str) -> HostResult<()>;

    /// Create an empty frame.
    fn create_frame(&mut self, name: &str) -> HostResult<()>;

    /// Drop a frame that is not current.
    fn drop_frame(&mut self, name: &str) -> HostResult<()>;

    /// Whether a frame named `name` exists.
    fn has_frame(&self, name: &str) -> bool {
        self.frame_names().iter().any(|f| f == name)
    }

    /// Full column catalogue of the current frame, in order.
    fn columns(&self) -> HostResult<Vec<Column>> {
        (0..self.column_count())
            .map(|i| {
                Ok(Column {
                    name: self.column_name(i)?,
                    storage: self.column_storage_type(i)?,
                    label: self.column_label(i)?,
                })
            })
            .collect()
    }
}

/// One entry of a frame's column catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name, unique within the frame.
    pub name: String,
    /// Declared storage type.
    pub storage: StorageType,
    /// Human-readable label; empty when unset.
    pub label: String,
}

impl Column {
    /// Column without a label.
    pub fn new(name: impl Into<String>, storage: StorageType) -> Self {
        Column {
            name: name.into(),
            storage,
            label: String::new(),
        }
    }

    /// Builder-style label setter.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Scoped switch of the host's current frame.
///
/// Captures the current frame on construction, switches to the requested
/// one, and switches back when dropped. The host is reachable through
/// `Deref`/`DerefMut` while the guard is alive.
pub struct FrameGuard<'a, H: Host + ?Sized> {
    host: &'a mut H,
    previous: String,
}

impl<'a, H: Host + ?Sized> FrameGuard<'a, H> {
    /// Switch `host` to `frame` until the guard is dropped.
    pub fn enter(host: &'a mut H, frame: &str) -> HostResult<Self> {
        let previous = host.current_frame();
        host.set_current_frame(frame)?;
        Ok(FrameGuard { host, previous })
    }

    /// The frame that will be restored on drop.
    pub fn previous(&self) -> &str {
        &self.previous
    }
}

impl<H: Host + ?Sized> Deref for FrameGuard<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        &*self.host
    }
}

impl<H: Host + ?Sized> DerefMut for FrameGuard<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        &mut *self.host
    }
}

impl<H: Host + ?Sized> Drop for FrameGuard<'_, H> {
    fn drop(&mut self) {
        if let Err(e) = self.host.set_current_frame(&self.previous) {
            warn!("failed to restore frame {}: {e}", self.previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryHost;
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn frame_guard_restores_previous_frame() -> TestResult {
        let mut host = MemoryHost::new();
        host.create_frame("aux")?;
        {
            let mut guard = FrameGuard::enter(&mut host, "aux")?;
            assert_eq!(guard.current_frame(), "aux");
            assert_eq!(guard.previous(), MemoryHost::DEFAULT_FRAME);
            guard.add_column(StorageType::Byte, "x")?;
        }
        assert_eq!(host.current_frame(), MemoryHost::DEFAULT_FRAME);
        assert_eq!(host.column_count(), 0);
        Ok(())
    }

    #[test]
    fn frame_guard_restores_on_error_path() -> TestResult {
        fn fails_inside(host: &mut MemoryHost) -> HostResult<()> {
            let mut guard = FrameGuard::enter(host, "aux")?;
            guard.add_column(StorageType::Byte, "x")?;
            guard.add_column(StorageType::Byte, "x")?;
            Ok(())
        }

        let mut host = MemoryHost::new();
        host.create_frame("aux")?;
        let err = fails_inside(&mut host).expect_err("duplicate column");
        assert!(matches!(err, HostError::DuplicateColumn { .. }));
        assert_eq!(host.current_frame(), MemoryHost::DEFAULT_FRAME);
        Ok(())
    }

    #[test]
    fn entering_missing_frame_leaves_context_alone() {
        let mut host = MemoryHost::new();
        assert!(FrameGuard::enter(&mut host, "nope").is_err());
        assert_eq!(host.current_frame(), MemoryHost::DEFAULT_FRAME);
    }

    #[test]
    fn fit_cell_bridges_kinds() {
        let s = memory::DEFAULT_MISSING;
        assert_eq!(fit_cell(None, StorageType::Int, s), Cell::Num(s));
        assert_eq!(fit_cell(None, StorageType::StrL, s), Cell::Str(String::new()));
        assert_eq!(
            fit_cell(Some(Cell::Num(3.0)), StorageType::Str(4), s),
            Cell::Str("3".into())
        );
        assert_eq!(
            fit_cell(Some(Cell::Str(" 2.5".into())), StorageType::Double, s),
            Cell::Num(2.5)
        );
        assert_eq!(
            fit_cell(Some(Cell::Str("n/a".into())), StorageType::Double, s),
            Cell::Num(s)
        );
        for odd in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(fit_cell(Some(Cell::Num(odd)), StorageType::Double, s), Cell::Num(s));
        }
        assert_eq!(
            fit_cell(Some(Cell::Str("NaN".into())), StorageType::Float, s),
            Cell::Num(s)
        );
    }

    #[test]
    fn missing_test_covers_extended_codes() {
        let sentinel = memory::DEFAULT_MISSING;
        assert!(Cell::Num(sentinel).is_missing(sentinel));
        assert!(Cell::Num(f64::MAX).is_missing(sentinel));
        assert!(Cell::Num(f64::NAN).is_missing(sentinel));
        assert!(!Cell::Num(1.0e300).is_missing(sentinel));
        assert!(!Cell::Str(String::new()).is_missing(sentinel));
    }
}
