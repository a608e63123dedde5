pub mod error;
pub mod types;

pub use error::SheetSqlError;
pub use types::{ResultSet, Row, ScalarValue};
