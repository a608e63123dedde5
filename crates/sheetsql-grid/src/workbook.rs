use crate::worksheet::Worksheet;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::info;

const MAGIC: &[u8; 4] = b"SQSH";
const FORMAT_VERSION: u8 = 1;

/// Sheet lookup key: position in the workbook or sheet name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetId {
    Index(usize),
    Name(String),
}

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetId::Index(idx) => write!(f, "#{idx}"),
            SheetId::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for SheetId {
    fn from(value: usize) -> Self {
        SheetId::Index(value)
    }
}

impl From<&str> for SheetId {
    fn from(value: &str) -> Self {
        SheetId::Name(value.to_string())
    }
}

impl From<String> for SheetId {
    fn from(value: String) -> Self {
        SheetId::Name(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    sheets: Vec<Worksheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self { sheets: Vec::new() }
    }

    /// A workbook holding a single empty `Sheet1`.
    pub fn blank() -> Self {
        Self {
            sheets: vec![Worksheet::new("Sheet1")],
        }
    }

    pub fn add_sheet(&mut self, sheet: Worksheet) -> Result<&mut Worksheet> {
        if self.sheets.iter().any(|s| s.name() == sheet.name()) {
            bail!("sheet already exists: {}", sheet.name());
        }
        self.sheets.push(sheet);
        let idx = self.sheets.len() - 1;
        Ok(&mut self.sheets[idx])
    }

    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    pub fn sheet_index(&self, id: &SheetId) -> Option<usize> {
        match id {
            SheetId::Index(idx) if *idx < self.sheets.len() => Some(*idx),
            SheetId::Index(_) => None,
            SheetId::Name(name) => self.sheets.iter().position(|s| s.name() == name),
        }
    }

    pub fn sheet(&self, id: &SheetId) -> Option<&Worksheet> {
        self.sheet_index(id).map(|idx| &self.sheets[idx])
    }

    pub fn sheet_mut(&mut self, id: &SheetId) -> Option<&mut Worksheet> {
        self.sheet_index(id).map(move |idx| &mut self.sheets[idx])
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MAGIC.len() + 1 || &bytes[..MAGIC.len()] != MAGIC {
            bail!("not a workbook image");
        }
        let version = bytes[MAGIC.len()];
        if version != FORMAT_VERSION {
            bail!("unsupported workbook format version {version}");
        }
        let workbook = bincode::deserialize(&bytes[MAGIC.len() + 1..])?;
        Ok(workbook)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(self)?;
        let mut out = Vec::with_capacity(MAGIC.len() + 1 + body.len());
        out.extend_from_slice(MAGIC);
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub async fn from_blank_async() -> Result<Self> {
        Ok(Self::blank())
    }

    pub async fn from_data_async(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes(bytes)
    }

    pub async fn from_file_async(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let workbook = Self::from_bytes(&bytes)?;
        info!("loaded workbook {} ({} sheets)", path.display(), workbook.sheets.len());
        Ok(workbook)
    }

    pub async fn to_file_async(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        tokio::fs::write(path, bytes).await?;
        info!("saved workbook {} ({} sheets)", path.display(), self.sheets.len());
        Ok(())
    }
}
