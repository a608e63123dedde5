use regex::Regex;
use sheetsql_core::error::SheetSqlError;
use sheetsql_grid::{CellRef, Extent, SheetId, Workbook};
use std::sync::OnceLock;

/// `[sheet$]start[:end]`, where `sheet` is a bare run without `!`/`$` or a
/// single-quoted name.
const ADDRESS_PATTERN: &str = r"^(?:('[^']+'|[^!$]+)\$)?([A-Z]{1,3}\d+)(?::([A-Z]{1,3}\d+))?$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    /// No reference at all: first sheet, full used extent.
    Default,
    /// Start and end cell given.
    Explicit,
    /// Start cell only; the end comes from the used extent.
    Open,
    /// A sheet name with no cells; trailing blank rows are trimmed.
    BareSheet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableAddress {
    pub source: String,
    pub sheet: SheetId,
    pub start: Option<CellRef>,
    pub end: Option<CellRef>,
}

/// A table address pinned to a sheet and an inclusive cell rectangle whose
/// first row is the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub sheet: usize,
    pub extent: Extent,
}

impl TableAddress {
    pub fn parse(address: &str) -> Self {
        let source = address.to_string();
        if address.is_empty() {
            return Self {
                source,
                sheet: SheetId::Index(0),
                start: None,
                end: None,
            };
        }
        if let Some(parsed) = match_grammar(address) {
            return parsed;
        }
        Self {
            source,
            sheet: SheetId::Name(address.to_string()),
            start: None,
            end: None,
        }
    }

    pub fn kind(&self) -> AddressKind {
        match (&self.sheet, self.start, self.end) {
            (_, Some(_), Some(_)) => AddressKind::Explicit,
            (_, Some(_), None) => AddressKind::Open,
            (SheetId::Name(_), None, _) => AddressKind::BareSheet,
            (SheetId::Index(_), None, _) => AddressKind::Default,
        }
    }

    pub fn resolve(&self, workbook: &Workbook) -> Result<ResolvedRange, SheetSqlError> {
        let not_found = || SheetSqlError::AddressNotFound(self.source.clone());
        let sheet_idx = workbook.sheet_index(&self.sheet).ok_or_else(not_found)?;
        let sheet = &workbook.sheets()[sheet_idx];

        let extent = match (self.start, self.end) {
            (Some(start), Some(end)) => Extent::new(
                CellRef::new(start.row.min(end.row), start.column.min(end.column)),
                CellRef::new(start.row.max(end.row), start.column.max(end.column)),
            ),
            (Some(start), None) => {
                let used = sheet.used_extent().ok_or_else(not_found)?;
                Extent::new(
                    start,
                    CellRef::new(used.end.row.max(start.row), used.end.column.max(start.column)),
                )
            }
            (None, _) => {
                let mut used = sheet.used_extent().ok_or_else(not_found)?;
                if self.kind() == AddressKind::BareSheet {
                    // cleared rows stay in the used extent; drop them from the body
                    while used.end.row > used.start.row
                        && (used.start.column..=used.end.column)
                            .all(|col| sheet.cell(CellRef::new(used.end.row, col)).is_empty())
                    {
                        used.end.row -= 1;
                    }
                }
                used
            }
        };
        Ok(ResolvedRange {
            sheet: sheet_idx,
            extent,
        })
    }
}

fn match_grammar(address: &str) -> Option<TableAddress> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(ADDRESS_PATTERN).ok()).as_ref()?;
    let caps = re.captures(address)?;
    let sheet = match caps.get(1) {
        Some(m) => {
            let name = m.as_str();
            let unquoted = name
                .strip_prefix('\'')
                .and_then(|n| n.strip_suffix('\''))
                .unwrap_or(name);
            SheetId::Name(unquoted.to_string())
        }
        None => SheetId::Index(0),
    };
    let start = CellRef::parse(caps.get(2)?.as_str())?;
    let end = match caps.get(3) {
        Some(m) => Some(CellRef::parse(m.as_str())?),
        None => None,
    };
    Some(TableAddress {
        source: address.to_string(),
        sheet,
        start: Some(start),
        end,
    })
}

#[cfg(test)]
mod tests {
    use super::{AddressKind, TableAddress};
    use sheetsql_core::error::SheetSqlError;
    use sheetsql_core::types::ScalarValue;
    use sheetsql_grid::{CellRef, SheetId, Workbook, Worksheet};

    #[test]
    fn classifies_reference_forms() {
        let explicit = TableAddress::parse("Sheet1$A1:C52");
        assert_eq!(explicit.kind(), AddressKind::Explicit);
        assert_eq!(explicit.sheet, SheetId::Name("Sheet1".into()));
        assert_eq!(explicit.start, Some(CellRef::new(1, 1)));
        assert_eq!(explicit.end, Some(CellRef::new(52, 3)));

        let open = TableAddress::parse("'My Sheet'$B2");
        assert_eq!(open.kind(), AddressKind::Open);
        assert_eq!(open.sheet, SheetId::Name("My Sheet".into()));

        let unprefixed = TableAddress::parse("B2:D9");
        assert_eq!(unprefixed.kind(), AddressKind::Explicit);
        assert_eq!(unprefixed.sheet, SheetId::Index(0));

        let apostrophe = TableAddress::parse("O'Brien$A1:B2");
        assert_eq!(apostrophe.kind(), AddressKind::Explicit);
        assert_eq!(apostrophe.sheet, SheetId::Name("O'Brien".into()));
        assert_eq!(apostrophe.end, Some(CellRef::new(2, 2)));

        assert_eq!(TableAddress::parse("Sheet1").kind(), AddressKind::BareSheet);
        assert_eq!(TableAddress::parse("").kind(), AddressKind::Default);
        assert_eq!(TableAddress::parse("Sheet1$a1").kind(), AddressKind::BareSheet);
    }

    #[test]
    fn missing_sheet_is_address_not_found() {
        let workbook = Workbook::blank();
        let err = TableAddress::parse("Nope").resolve(&workbook).expect_err("should fail");
        assert!(matches!(err, SheetSqlError::AddressNotFound(name) if name == "Nope"));
    }

    #[test]
    fn open_range_ends_at_used_extent() {
        let mut workbook = Workbook::new();
        workbook
            .add_sheet(Worksheet::from_rows(
                "Data",
                vec![vec!["a", "b", "c"], vec!["1", "2", "3"], vec!["4", "5", "6"]],
            ))
            .expect("add");
        let range = TableAddress::parse("Data$B1").resolve(&workbook).expect("resolve");
        assert_eq!(range.extent.start, CellRef::new(1, 2));
        assert_eq!(range.extent.end, CellRef::new(3, 3));
    }

    #[test]
    fn bare_sheet_trims_only_trailing_blank_rows() {
        let mut sheet = Worksheet::from_rows("S", vec![vec!["h1", "h2"], vec!["x", "y"]]);
        for row in 2..6 {
            sheet.set_value(row, 0, ScalarValue::Empty);
            sheet.set_value(row, 1, ScalarValue::Empty);
        }
        let mut workbook = Workbook::new();
        workbook.add_sheet(sheet).expect("add");

        let bare = TableAddress::parse("S").resolve(&workbook).expect("resolve");
        assert_eq!(bare.extent.end, CellRef::new(2, 2));

        let explicit = TableAddress::parse("S$A1:B6").resolve(&workbook).expect("resolve");
        assert_eq!(explicit.extent.end, CellRef::new(6, 2));

        let default = TableAddress::parse("").resolve(&workbook).expect("resolve");
        assert_eq!(default.extent.end, CellRef::new(6, 2));
    }
}
