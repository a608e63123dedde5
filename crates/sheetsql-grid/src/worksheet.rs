use crate::cell::{CellRef, Extent};
use serde::{Deserialize, Serialize};
use sheetsql_core::types::ScalarValue;
use std::collections::BTreeMap;

static EMPTY: ScalarValue = ScalarValue::Empty;

/// Sparse sheet of cells keyed by 0-based `(row, column)`.
///
/// Writing `Empty` keeps the cell entry, so a cleared cell still counts
/// towards the used extent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Worksheet {
    name: String,
    cells: BTreeMap<(usize, usize), ScalarValue>,
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    /// Fills a sheet from row-major values anchored at `A1`.
    pub fn from_rows<R, V>(name: impl Into<String>, rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        let mut sheet = Self::new(name);
        for (row, values) in rows.into_iter().enumerate() {
            for (column, value) in values.into_iter().enumerate() {
                sheet.set_value(row, column, value.into());
            }
        }
        sheet
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Smallest rectangle covering every cell entry, or `None` for a
    /// sheet that was never written.
    pub fn used_extent(&self) -> Option<Extent> {
        let mut keys = self.cells.keys();
        let &(first_row, first_col) = keys.next()?;
        let (mut min_row, mut max_row) = (first_row, first_row);
        let (mut min_col, mut max_col) = (first_col, first_col);
        for &(row, col) in keys {
            min_row = min_row.min(row);
            max_row = max_row.max(row);
            min_col = min_col.min(col);
            max_col = max_col.max(col);
        }
        Some(Extent::new(
            CellRef::from_indices(min_row, min_col),
            CellRef::from_indices(max_row, max_col),
        ))
    }

    pub fn value(&self, row: usize, column: usize) -> &ScalarValue {
        self.cells.get(&(row, column)).unwrap_or(&EMPTY)
    }

    pub fn cell(&self, cell: CellRef) -> &ScalarValue {
        self.value(cell.row_index(), cell.column_index())
    }

    pub fn set_value(&mut self, row: usize, column: usize, value: ScalarValue) {
        self.cells.insert((row, column), value);
    }

    /// Row-major snapshot of the inclusive rectangle `start..=end`.
    pub fn range(&self, start: CellRef, end: CellRef) -> Vec<Vec<ScalarValue>> {
        (start.row_index()..=end.row_index())
            .map(|row| {
                (start.column_index()..=end.column_index())
                    .map(|column| self.value(row, column).clone())
                    .collect()
            })
            .collect()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}
