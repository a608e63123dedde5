use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Index;

/// A single cell value as seen by the query engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum ScalarValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
}

impl ScalarValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, ScalarValue::Empty)
    }

    /// Numeric view of the value. Text is parsed, booleans count as 0/1.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScalarValue::Empty => None,
            ScalarValue::Number(n) => Some(*n),
            ScalarValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            ScalarValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    trimmed.parse::<f64>().ok()
                }
            }
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            ScalarValue::Empty => false,
            ScalarValue::Number(n) => *n != 0.0 && !n.is_nan(),
            ScalarValue::Text(s) => !s.is_empty(),
            ScalarValue::Boolean(b) => *b,
        }
    }

    /// Comparison used by predicates. Values of the same kind compare
    /// natively; mixed kinds compare numerically when both sides have a
    /// numeric view. Empty only equals empty and is unordered otherwise.
    pub fn loose_cmp(&self, other: &ScalarValue) -> Option<Ordering> {
        match (self, other) {
            (ScalarValue::Empty, ScalarValue::Empty) => Some(Ordering::Equal),
            (ScalarValue::Empty, _) | (_, ScalarValue::Empty) => None,
            (ScalarValue::Number(a), ScalarValue::Number(b)) => a.partial_cmp(b),
            (ScalarValue::Text(a), ScalarValue::Text(b)) => Some(a.cmp(b)),
            (ScalarValue::Boolean(a), ScalarValue::Boolean(b)) => Some(a.cmp(b)),
            _ => {
                let a = self.as_number()?;
                let b = other.as_number()?;
                a.partial_cmp(&b)
            }
        }
    }

    pub fn loose_eq(&self, other: &ScalarValue) -> bool {
        self.loose_cmp(other) == Some(Ordering::Equal)
    }

    /// Identity comparison for `IS`: same kind and same value.
    pub fn strict_eq(&self, other: &ScalarValue) -> bool {
        self == other
    }

    /// Total order used by ORDER BY: empty < boolean < number < text.
    pub fn sort_cmp(&self, other: &ScalarValue) -> Ordering {
        match (self, other) {
            (ScalarValue::Number(a), ScalarValue::Number(b)) => a.total_cmp(b),
            (ScalarValue::Text(a), ScalarValue::Text(b)) => a.cmp(b),
            (ScalarValue::Boolean(a), ScalarValue::Boolean(b)) => a.cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            ScalarValue::Empty => 0,
            ScalarValue::Boolean(_) => 1,
            ScalarValue::Number(_) => 2,
            ScalarValue::Text(_) => 3,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Empty => Ok(()),
            ScalarValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            ScalarValue::Number(n) => write!(f, "{n}"),
            ScalarValue::Text(s) => f.write_str(s),
            ScalarValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Number(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Number(value as f64)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Number(value as f64)
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Boolean(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Text(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Text(value)
    }
}

impl<T: Into<ScalarValue>> From<Option<T>> for ScalarValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Column-name keyed mapping that keeps insertion order.
///
/// Inserting an existing key replaces its value in place, so a row built
/// from a header with duplicate names keeps the last value under the first
/// position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    entries: Vec<(String, ScalarValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn get(&self, column: &str) -> Option<&ScalarValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut ScalarValue> {
        self.entries
            .iter_mut()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: ScalarValue) -> Option<ScalarValue> {
        let column = column.into();
        match self.get_mut(&column) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((column, value));
                None
            }
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &ScalarValue> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<ScalarValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.insert(column, value.into());
        }
        row
    }
}

/// Rows produced by a statement: the selected rows for SELECT, the affected
/// rows for INSERT/UPDATE/DELETE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Column names of the first row, in order.
    pub fn columns(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| row.columns().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl Index<usize> for ResultSet {
    type Output = Row;

    fn index(&self, index: usize) -> &Row {
        &self.rows[index]
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
