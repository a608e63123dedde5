use crate::address::{ResolvedRange, TableAddress};
use sheetsql_core::error::SheetSqlError;
use sheetsql_core::types::{Row, ScalarValue};
use sheetsql_grid::{CellRef, SheetId, Workbook, Worksheet};
use tracing::debug;

/// Header row plus body rows over a rectangle of one worksheet.
///
/// Row and column indices are 0-based and relative to the body origin (the
/// row right under the header). The body ends at the range end or at the
/// sheet's last written row, whichever comes first. Writes go straight
/// through to the sheet.
#[derive(Debug)]
pub struct LogicalTable<'a> {
    sheet: &'a mut Worksheet,
    header_row: usize,
    start_col: usize,
    width: usize,
    height: usize,
}

impl<'a> LogicalTable<'a> {
    pub fn open(workbook: &'a mut Workbook, address: &str) -> Result<Self, SheetSqlError> {
        let parsed = TableAddress::parse(address);
        let range = parsed.resolve(workbook)?;
        debug!(
            "resolved table {:?} ({:?}) to {}",
            address,
            parsed.kind(),
            range.extent
        );
        Self::from_range(workbook, range)
    }

    pub fn from_range(workbook: &'a mut Workbook, range: ResolvedRange) -> Result<Self, SheetSqlError> {
        let sheet_id: SheetId = range.sheet.into();
        let sheet = workbook
            .sheet_mut(&sheet_id)
            .ok_or_else(|| SheetSqlError::AddressNotFound(sheet_id.to_string()))?;
        let extent = range.extent;
        let header_row = extent.start.row_index();
        // rows past the last written row hold no cells; the body stops there
        let last_row = sheet
            .used_extent()
            .map(|used| used.end.row_index().min(extent.end.row_index()))
            .unwrap_or(header_row);
        Ok(Self {
            sheet,
            header_row,
            start_col: extent.start.column_index(),
            width: extent.columns(),
            height: last_row.saturating_sub(header_row),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn header(&self, column: usize) -> Result<String, SheetSqlError> {
        if column >= self.width {
            return Err(SheetSqlError::OutOfRange { row: 0, column });
        }
        Ok(self
            .sheet
            .value(self.header_row, self.start_col + column)
            .to_string())
    }

    pub fn headers(&self) -> Vec<String> {
        (0..self.width)
            .map(|col| self.sheet.value(self.header_row, self.start_col + col).to_string())
            .collect()
    }

    pub fn value(&self, row: usize, column: usize) -> Result<&ScalarValue, SheetSqlError> {
        self.check_bounds(row, column)?;
        Ok(self
            .sheet
            .value(self.header_row + 1 + row, self.start_col + column))
    }

    /// Snapshot of every body row.
    pub fn rows(&self) -> Vec<Vec<ScalarValue>> {
        if self.height == 0 || self.width == 0 {
            return Vec::new();
        }
        self.sheet.range(
            CellRef::from_indices(self.header_row + 1, self.start_col),
            CellRef::from_indices(self.header_row + self.height, self.start_col + self.width - 1),
        )
    }

    /// Writes a full row. `row == height()` appends a new row.
    pub fn update(&mut self, row: usize, values: &[ScalarValue]) -> Result<(), SheetSqlError> {
        if row > self.height {
            return Err(SheetSqlError::OutOfRange { row, column: 0 });
        }
        if values.len() != self.width {
            return Err(SheetSqlError::MalformedTable(format!(
                "row has {} values, table is {} columns wide",
                values.len(),
                self.width
            )));
        }
        let grid_row = self.header_row + 1 + row;
        for (col, value) in values.iter().enumerate() {
            self.sheet
                .set_value(grid_row, self.start_col + col, value.clone());
        }
        if row == self.height {
            self.height += 1;
        }
        Ok(())
    }

    /// Removes a row by shifting the rows below it up by one, then shrinks
    /// the body. The vacated last row is cleared.
    pub fn delete(&mut self, row: usize) -> Result<(), SheetSqlError> {
        if row >= self.height {
            return Err(SheetSqlError::OutOfRange { row, column: 0 });
        }
        let first = self.header_row + 1;
        let last = self.header_row + self.height;
        for grid_row in (first + row)..last {
            for col in self.start_col..self.start_col + self.width {
                let below = self.sheet.value(grid_row + 1, col).clone();
                self.sheet.set_value(grid_row, col, below);
            }
        }
        for col in self.start_col..self.start_col + self.width {
            self.sheet.set_value(last, col, ScalarValue::Empty);
        }
        self.height -= 1;
        Ok(())
    }

    fn check_bounds(&self, row: usize, column: usize) -> Result<(), SheetSqlError> {
        if row >= self.height || column >= self.width {
            return Err(SheetSqlError::OutOfRange { row, column });
        }
        Ok(())
    }
}

/// Pairs a body row with the header names.
pub fn build_row(headers: &[String], values: Vec<ScalarValue>) -> Row {
    let mut row = Row::with_capacity(headers.len());
    for (name, value) in headers.iter().zip(values) {
        row.insert(name.clone(), value);
    }
    row
}

#[cfg(test)]
mod tests {
    use super::{build_row, LogicalTable};
    use sheetsql_core::error::SheetSqlError;
    use sheetsql_core::types::ScalarValue;
    use sheetsql_grid::{SheetId, Workbook, Worksheet};

    fn workbook() -> Workbook {
        let mut workbook = Workbook::new();
        workbook
            .add_sheet(Worksheet::from_rows(
                "Sheet1",
                vec![
                    vec![ScalarValue::from("State"), ScalarValue::from("Ranking"), ScalarValue::from("Population")],
                    vec![ScalarValue::from("Ohio"), ScalarValue::from(7), ScalarValue::from(11_700_000)],
                    vec![ScalarValue::from("Iowa"), ScalarValue::from(30), ScalarValue::from(3_190_000)],
                    vec![ScalarValue::from("Utah"), ScalarValue::from(31), ScalarValue::from(3_270_000)],
                ],
            ))
            .expect("add");
        workbook
    }

    #[test]
    fn bare_sheet_splits_header_and_body() {
        let mut wb = workbook();
        let table = LogicalTable::open(&mut wb, "Sheet1").expect("open");
        assert_eq!(table.width(), 3);
        assert_eq!(table.height(), 3);
        assert_eq!(table.headers(), vec!["State", "Ranking", "Population"]);
        assert_eq!(table.value(1, 0).expect("value"), &ScalarValue::from("Iowa"));
    }

    #[test]
    fn explicit_range_uses_its_own_header() {
        let mut wb = workbook();
        let table = LogicalTable::open(&mut wb, "Sheet1$B2:C4").expect("open");
        assert_eq!(table.width(), 2);
        assert_eq!(table.height(), 2);
        assert_eq!(table.header(0).expect("header"), "7");
        assert_eq!(table.value(0, 0).expect("value"), &ScalarValue::Number(30.0));
    }

    #[test]
    fn access_outside_body_is_out_of_range() {
        let mut wb = workbook();
        let table = LogicalTable::open(&mut wb, "Sheet1").expect("open");
        assert!(matches!(table.value(3, 0), Err(SheetSqlError::OutOfRange { row: 3, column: 0 })));
        assert!(matches!(table.value(0, 3), Err(SheetSqlError::OutOfRange { .. })));
        assert!(matches!(table.header(3), Err(SheetSqlError::OutOfRange { .. })));
    }

    #[test]
    fn update_at_height_appends() {
        let mut wb = workbook();
        let mut table = LogicalTable::open(&mut wb, "Sheet1").expect("open");
        let row = vec![ScalarValue::from("Maine"), ScalarValue::Empty, ScalarValue::from(1_390_000)];
        table.update(3, &row).expect("append");
        assert_eq!(table.height(), 4);
        assert!(table.update(5, &row).is_err());
        assert!(matches!(
            table.update(0, &row[..2]),
            Err(SheetSqlError::MalformedTable(_))
        ));
        let sheet = wb.sheet(&SheetId::Index(0)).expect("sheet");
        assert_eq!(sheet.value(4, 0), &ScalarValue::from("Maine"));
    }

    #[test]
    fn delete_shifts_rows_up_and_clears_tail() {
        let mut wb = workbook();
        let mut table = LogicalTable::open(&mut wb, "Sheet1").expect("open");
        table.delete(0).expect("delete");
        assert_eq!(table.height(), 2);
        let names: Vec<_> = table.rows().into_iter().map(|r| r[0].clone()).collect();
        assert_eq!(names, vec![ScalarValue::from("Iowa"), ScalarValue::from("Utah")]);
        assert!(table.delete(2).is_err());

        let reopened = LogicalTable::open(&mut wb, "Sheet1").expect("reopen");
        assert_eq!(reopened.height(), 2);
    }

    #[test]
    fn body_stops_at_last_written_row() {
        let mut wb = workbook();
        let table = LogicalTable::open(&mut wb, "Sheet1$A1:C100000000").expect("open");
        assert_eq!(table.height(), 3);
        assert_eq!(table.rows().len(), 3);

        let table = LogicalTable::open(&mut wb, "Sheet1$A9:C100000000").expect("open");
        assert_eq!(table.height(), 0);
        assert!(table.rows().is_empty());
    }

    #[test]
    fn build_row_keys_by_header() {
        let headers = vec!["a".to_string(), "b".to_string()];
        let row = build_row(&headers, vec![ScalarValue::from(1), ScalarValue::from("x")]);
        assert_eq!(row.get("b"), Some(&ScalarValue::from("x")));
    }
}
