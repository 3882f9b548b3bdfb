//! In-memory [`Host`] implementation.
//!
//! `MemoryHost` keeps a set of named frames, each a column-major table with
//! labels and optional value-label sets. It behaves like the real host in
//! the ways the engine can observe: new numeric cells start out missing,
//! new text cells start out empty, and only non-current frames can be
//! dropped.
use std::{collections::BTreeMap, ops::Range};

use snafu::prelude::*;

use super::{
    BackendSnafu, Cell, CellKindSnafu, ColumnOutOfRangeSnafu, DuplicateColumnSnafu,
    FrameExistsSnafu, Host, HostResult, RowsOutOfRangeSnafu, UnknownFrameSnafu, ValueCountSnafu,
    ValueLabelSet,
};
use crate::types::StorageType;

/// The host's system missing value (2^1023).
pub const DEFAULT_MISSING: f64 = 8.988_465_674_311_58e307;

#[derive(Debug, Clone)]
struct MemColumn {
    name: String,
    storage: StorageType,
    label: String,
    value_labels: Option<ValueLabelSet>,
    cells: Vec<Cell>,
}

#[derive(Debug, Clone, Default)]
struct Frame {
    columns: Vec<MemColumn>,
    nobs: usize,
}

impl Frame {
    fn column(&self, index: usize) -> HostResult<&MemColumn> {
        let count = self.columns.len();
        self.columns
            .get(index)
            .context(ColumnOutOfRangeSnafu { index, count })
    }

    fn column_mut(&mut self, index: usize) -> HostResult<&mut MemColumn> {
        let count = self.columns.len();
        self.columns
            .get_mut(index)
            .context(ColumnOutOfRangeSnafu { index, count })
    }

    fn check_rows(&self, rows: &Range<usize>) -> HostResult<()> {
        ensure!(
            rows.start <= rows.end && rows.end <= self.nobs,
            RowsOutOfRangeSnafu {
                start: rows.start,
                end: rows.end,
                count: self.nobs,
            }
        );
        Ok(())
    }
}

/// An in-memory host with multiple frames.
#[derive(Debug, Clone)]
pub struct MemoryHost {
    frames: BTreeMap<String, Frame>,
    current: String,
    sentinel: f64,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// Name of the frame a fresh host starts in.
    pub const DEFAULT_FRAME: &'static str = "default";

    /// Host with a single empty `default` frame.
    pub fn new() -> Self {
        let mut frames = BTreeMap::new();
        frames.insert(Self::DEFAULT_FRAME.to_string(), Frame::default());
        MemoryHost {
            frames,
            current: Self::DEFAULT_FRAME.to_string(),
            sentinel: DEFAULT_MISSING,
        }
    }

    /// Replace the missing-value sentinel.
    pub fn with_sentinel(mut self, sentinel: f64) -> Self {
        self.sentinel = sentinel;
        self
    }

    /// Append a fully populated column to the current frame.
    ///
    /// The first column fixes the observation count; later columns must
    /// match it.
    pub fn push_column(
        &mut self,
        name: &str,
        storage: StorageType,
        label: &str,
        cells: Vec<Cell>,
    ) -> HostResult<()> {
        if self.column_count() == 0 && self.observation_count() == 0 {
            self.add_observations(cells.len())?;
        }
        let nobs = self.observation_count();
        self.add_column(storage, name)?;
        let index = self.column_count() - 1;
        self.set_column_label(index, label)?;
        self.write_cells(index, 0..nobs, cells)
    }

    /// All cells of column `index` in the current frame.
    pub fn column_cells(&self, index: usize) -> HostResult<&[Cell]> {
        Ok(self.frame()?.column(index)?.cells.as_slice())
    }

    /// Index of the column named `name` in the current frame.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.frame()
            .ok()?
            .columns
            .iter()
            .position(|c| c.name == name)
    }

    /// Value labels attached to column `index` of the current frame.
    pub fn value_labels(&self, index: usize) -> HostResult<Option<&ValueLabelSet>> {
        Ok(self.frame()?.column(index)?.value_labels.as_ref())
    }

    fn frame(&self) -> HostResult<&Frame> {
        self.frames.get(&self.current).context(UnknownFrameSnafu {
            name: self.current.clone(),
        })
    }

    fn frame_mut(&mut self) -> HostResult<&mut Frame> {
        let name = self.current.clone();
        self.frames
            .get_mut(&name)
            .context(UnknownFrameSnafu { name })
    }

    fn empty_cell(&self, storage: StorageType) -> Cell {
        if storage.is_text() {
            Cell::Str(String::new())
        } else {
            Cell::Num(self.sentinel)
        }
    }
}

impl Host for MemoryHost {
    fn column_count(&self) -> usize {
        self.frame().map(|f| f.columns.len()).unwrap_or(0)
    }

    fn column_name(&self, index: usize) -> HostResult<String> {
        Ok(self.frame()?.column(index)?.name.clone())
    }

    fn column_storage_type(&self, index: usize) -> HostResult<StorageType> {
        Ok(self.frame()?.column(index)?.storage)
    }

    fn column_label(&self, index: usize) -> HostResult<String> {
        Ok(self.frame()?.column(index)?.label.clone())
    }

    fn set_column_label(&mut self, index: usize, label: &str) -> HostResult<()> {
        self.frame_mut()?.column_mut(index)?.label = label.to_string();
        Ok(())
    }

    fn observation_count(&self) -> usize {
        self.frame().map(|f| f.nobs).unwrap_or(0)
    }

    fn add_observations(&mut self, n: usize) -> HostResult<()> {
        let sentinel = self.sentinel;
        let frame = self.frame_mut()?;
        frame.nobs += n;
        for col in &mut frame.columns {
            let fill = if col.storage.is_text() {
                Cell::Str(String::new())
            } else {
                Cell::Num(sentinel)
            };
            col.cells.resize(frame.nobs, fill);
        }
        Ok(())
    }

    fn keep_observations(&mut self, n: usize) -> HostResult<()> {
        let frame = self.frame_mut()?;
        if n < frame.nobs {
            frame.nobs = n;
            for col in &mut frame.columns {
                col.cells.truncate(n);
            }
        }
        Ok(())
    }

    fn drop_all_columns(&mut self) -> HostResult<()> {
        self.frame_mut()?.columns.clear();
        Ok(())
    }

    fn add_column(&mut self, storage: StorageType, name: &str) -> HostResult<()> {
        let fill = self.empty_cell(storage);
        let frame = self.frame_mut()?;
        ensure!(
            frame.columns.iter().all(|c| c.name != name),
            DuplicateColumnSnafu { name }
        );
        frame.columns.push(MemColumn {
            name: name.to_string(),
            storage,
            label: String::new(),
            value_labels: None,
            cells: vec![fill; frame.nobs],
        });
        Ok(())
    }

    fn missing_sentinel(&self) -> f64 {
        self.sentinel
    }

    fn read_cells(&self, columns: Range<usize>, rows: Range<usize>) -> HostResult<Vec<Vec<Cell>>> {
        let frame = self.frame()?;
        frame.check_rows(&rows)?;
        let cols = columns
            .map(|i| frame.column(i))
            .collect::<HostResult<Vec<_>>>()?;
        Ok(rows
            .map(|r| cols.iter().map(|c| c.cells[r].clone()).collect())
            .collect())
    }

    fn write_cells(
        &mut self,
        column: usize,
        rows: Range<usize>,
        values: Vec<Cell>,
    ) -> HostResult<()> {
        let frame = self.frame_mut()?;
        frame.check_rows(&rows)?;
        let col = frame.column_mut(column)?;
        ensure!(
            values.len() == rows.len(),
            ValueCountSnafu {
                column: col.name.clone(),
                expected: rows.len(),
                actual: values.len(),
            }
        );
        let text = col.storage.is_text();
        ensure!(
            values.iter().all(|v| matches!(v, Cell::Str(_)) == text),
            CellKindSnafu {
                column: col.name.clone(),
                storage: col.storage,
            }
        );
        for (slot, value) in col.cells[rows].iter_mut().zip(values) {
            *slot = value;
        }
        Ok(())
    }

    fn set_value_labels(&mut self, column: usize, labels: ValueLabelSet) -> HostResult<()> {
        self.frame_mut()?.column_mut(column)?.value_labels = Some(labels);
        Ok(())
    }

    fn frame_names(&self) -> Vec<String> {
        self.frames.keys().cloned().collect()
    }

    fn current_frame(&self) -> String {
        self.current.clone()
    }

    fn set_current_frame(&mut self, name: &str) -> HostResult<()> {
        ensure!(self.frames.contains_key(name), UnknownFrameSnafu { name });
        self.current = name.to_string();
        Ok(())
    }

    fn create_frame(&mut self, name: &str) -> HostResult<()> {
        ensure!(!self.frames.contains_key(name), FrameExistsSnafu { name });
        self.frames.insert(name.to_string(), Frame::default());
        Ok(())
    }

    fn drop_frame(&mut self, name: &str) -> HostResult<()> {
        if name == self.current {
            return BackendSnafu {
                message: format!("cannot drop the current frame {name}"),
            }
            .fail();
        }
        self.frames
            .remove(name)
            .map(|_| ())
            .context(UnknownFrameSnafu { name })
    }
}
