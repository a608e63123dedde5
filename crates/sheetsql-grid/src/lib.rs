pub mod cell;
pub mod workbook;
pub mod worksheet;

pub use cell::{CellRef, Extent};
pub use workbook::{SheetId, Workbook};
pub use worksheet::Worksheet;
