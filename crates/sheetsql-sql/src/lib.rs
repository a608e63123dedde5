pub mod address;
pub mod executor;
pub mod parser;
pub mod planner;
pub mod predicate;
pub mod projector;
pub mod table;

pub use executor::SqlExecutor;
pub use parser::{parse_sql, ParsedStatement};
