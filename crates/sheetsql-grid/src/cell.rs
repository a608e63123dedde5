use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 1-based cell coordinate, written `B12` in address form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRef {
    pub row: usize,
    pub column: usize,
}

impl CellRef {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }

    /// Builds a reference from 0-based grid indices.
    pub fn from_indices(row: usize, column: usize) -> Self {
        Self {
            row: row + 1,
            column: column + 1,
        }
    }

    pub fn row_index(&self) -> usize {
        self.row.saturating_sub(1)
    }

    pub fn column_index(&self) -> usize {
        self.column.saturating_sub(1)
    }

    /// Parses an uppercase letters-then-digits token such as `AB7`.
    /// Letters form a bijective base-26 column number (`A` = 1, `AA` = 27).
    pub fn parse(token: &str) -> Option<Self> {
        let split = token.find(|c: char| !c.is_ascii_uppercase())?;
        let (letters, digits) = token.split_at(split);
        if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let mut column = 0usize;
        for b in letters.bytes() {
            column = column.checked_mul(26)?.checked_add((b - b'A' + 1) as usize)?;
        }
        let row: usize = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Self { row, column })
    }

    pub fn column_letters(&self) -> String {
        let mut n = self.column;
        let mut out = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            out.push(b'A' + rem as u8);
            n = (n - 1) / 26;
        }
        out.reverse();
        String::from_utf8(out).unwrap_or_default()
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column_letters(), self.row)
    }
}

impl FromStr for CellRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CellRef::parse(s).ok_or_else(|| anyhow::anyhow!("invalid cell reference: {s}"))
    }
}

/// Inclusive rectangle between two cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub start: CellRef,
    pub end: CellRef,
}

impl Extent {
    pub fn new(start: CellRef, end: CellRef) -> Self {
        Self { start, end }
    }

    pub fn rows(&self) -> usize {
        self.end.row + 1 - self.start.row
    }

    pub fn columns(&self) -> usize {
        self.end.column + 1 - self.start.column
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}
