//! Tabular input and output.
//!
//! The pipeline reads its work list from a table and writes its report to a
//! table. Both sides go through small traits so the on-disk format stays
//! out of the pipeline:
//!
//! - **spreadsheet**: `.xlsx`, `.xlsm`, `.xls`, `.ods` (first worksheet, header row)
//! - **json**: `.json` (array of objects), `.jsonl` / `.ndjson` (one object per line)

pub mod json;
pub mod spreadsheet;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::{InputError, ReportError};

/// One input row: column header -> cell text.
pub type RawRow = HashMap<String, String>;

/// One output row: column name -> value. Absent keys are left unwritten.
pub type TableRow = BTreeMap<String, Cell>;

/// A typed output cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Integer(i64),
    Float(f64),
    Text(String),
}

/// Supported table formats, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Excel / OpenDocument workbook
    Spreadsheet,
    /// Single JSON array of objects
    Json,
    /// One JSON object per line (newline-delimited JSON)
    JsonLines,
}

impl TableFormat {
    /// Parse format from an extension (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "xlsx" | "xlsm" | "xls" | "ods" => Some(Self::Spreadsheet),
            "json" => Some(Self::Json),
            "jsonl" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }

    /// Detect the format of a path from its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::parse)
    }
}

/// Reads the input table.
pub trait TableReader: Send + Sync {
    /// Read every data row of the table at `path`.
    fn read_table(&self, path: &Path) -> Result<Vec<RawRow>, InputError>;
}

/// Writes the output table.
pub trait TableWriter: Send + Sync {
    /// Write `rows` to `path`, laying out `columns` in the given order.
    fn write_table(
        &self,
        path: &Path,
        rows: &[TableRow],
        columns: &[&str],
    ) -> Result<(), ReportError>;
}

/// File-backed table reader/writer dispatching on the file extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTable;

impl TableReader for FileTable {
    fn read_table(&self, path: &Path) -> Result<Vec<RawRow>, InputError> {
        match TableFormat::from_path(path) {
            Some(TableFormat::Spreadsheet) => spreadsheet::read_rows(path),
            Some(TableFormat::Json) => json::read_rows(path, TableFormat::Json),
            Some(TableFormat::JsonLines) => json::read_rows(path, TableFormat::JsonLines),
            None => Err(InputError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

impl TableWriter for FileTable {
    fn write_table(
        &self,
        path: &Path,
        rows: &[TableRow],
        columns: &[&str],
    ) -> Result<(), ReportError> {
        match TableFormat::from_path(path) {
            Some(TableFormat::Spreadsheet) => spreadsheet::write_rows(path, rows, columns),
            Some(format) => json::write_rows(path, rows, columns, format),
            None => Err(ReportError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Shorthand for a read failure on `path`.
pub(crate) fn read_error(path: &Path, message: impl ToString) -> InputError {
    InputError::Read {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Shorthand for a parse failure on `path`.
pub(crate) fn parse_error(path: &Path, message: impl ToString) -> InputError {
    InputError::Parse {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Shorthand for a write failure on `path`.
pub(crate) fn write_error(path: &Path, message: impl ToString) -> ReportError {
    ReportError::Write {
        path: PathBuf::from(path),
        message: message.to_string(),
    }
}
