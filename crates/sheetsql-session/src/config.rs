use serde::Deserialize;
use sheetsql_core::error::SheetSqlError;
use std::path::PathBuf;

/// Where a session's workbook comes from. At most one source may be set;
/// with neither, the session starts from a blank workbook.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    /// Loaded on first use and written back on close.
    pub filename: Option<PathBuf>,
    pub data: Option<Vec<u8>>,
}

impl SessionConfig {
    pub fn with_filename(path: impl Into<PathBuf>) -> Self {
        Self {
            filename: Some(path.into()),
            data: None,
        }
    }

    pub fn with_data(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: None,
            data: Some(bytes.into()),
        }
    }

    pub fn validate(&self) -> Result<(), SheetSqlError> {
        if self.filename.is_some() && self.data.is_some() {
            return Err(SheetSqlError::Config(
                "filename and data are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }
}
