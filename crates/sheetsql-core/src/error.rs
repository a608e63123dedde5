use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetSqlError {
    #[error("cannot find address {0}")]
    AddressNotFound(String),
    #[error("cell out of range: row {row}, column {column}")]
    OutOfRange { row: usize, column: usize },
    #[error("selects from more than one table are not supported")]
    MultiTableUnsupported,
    #[error("invalid LIMIT expression: {0}")]
    InvalidLimit(String),
    #[error("ORDER BY only supported for columns: {0}")]
    UnsupportedOrderBy(String),
    #[error("parse error: {0}")]
    ParseFailure(String),
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("malformed table: {0}")]
    MalformedTable(String),
    #[error("not supported: {0}")]
    NotSupported(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("configuration error: {0}")]
    Config(String),
}
