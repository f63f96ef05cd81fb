//! JSON and JSON Lines tables.
//!
//! Input values may be strings, numbers or booleans; they are read as text.
//! `null` cells count as absent.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::{parse_error, read_error, write_error, RawRow, TableFormat, TableRow};
use crate::error::{InputError, ReportError};

/// Read rows from a JSON array of objects or from JSON Lines.
pub fn read_rows(path: &Path, format: TableFormat) -> Result<Vec<RawRow>, InputError> {
    let content = std::fs::read_to_string(path).map_err(|e| read_error(path, e))?;

    let objects: Vec<Map<String, Value>> = match format {
        TableFormat::JsonLines => content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str(line)
                    .map_err(|e| parse_error(path, format!("line {}: {e}", idx + 1)))
            })
            .collect::<Result<_, _>>()?,
        _ => serde_json::from_str(&content).map_err(|e| parse_error(path, e))?,
    };

    Ok(objects.into_iter().map(to_raw_row).collect())
}

/// Write rows as a pretty JSON array or as JSON Lines.
///
/// Keys follow `columns`; cells absent from a row are omitted.
pub fn write_rows(
    path: &Path,
    rows: &[TableRow],
    columns: &[&str],
    format: TableFormat,
) -> Result<(), ReportError> {
    let file = File::create(path).map_err(|e| write_error(path, e))?;
    let mut writer = TableRowWriter::new(BufWriter::new(file), columns, format);
    writer.write_all(rows).map_err(|e| write_error(path, e))?;
    writer.flush().map_err(|e| write_error(path, e))?;
    tracing::debug!("Wrote {} row(s) to {:?}", writer.rows_written(), path);
    Ok(())
}

fn to_raw_row(object: Map<String, Value>) -> RawRow {
    object
        .into_iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(s) => s,
                other => other.to_string(),
            };
            Some((key, text))
        })
        .collect()
}

/// A row whose keys serialize in column order.
struct OrderedRow<'a> {
    row: &'a TableRow,
    columns: &'a [&'a str],
}

impl Serialize for OrderedRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for column in self.columns {
            if let Some(cell) = self.row.get(*column) {
                map.serialize_entry(column, cell)?;
            }
        }
        map.end()
    }
}

/// Serializes table rows to an underlying writer.
struct TableRowWriter<'a, W: Write> {
    writer: W,
    columns: &'a [&'a str],
    format: TableFormat,
    rows_written: usize,
}

impl<'a, W: Write> TableRowWriter<'a, W> {
    fn new(writer: W, columns: &'a [&'a str], format: TableFormat) -> Self {
        Self {
            writer,
            columns,
            format,
            rows_written: 0,
        }
    }

    fn ordered<'r>(&self, row: &'r TableRow) -> OrderedRow<'r>
    where
        'a: 'r,
    {
        OrderedRow {
            row,
            columns: self.columns,
        }
    }

    fn write_all(&mut self, rows: &[TableRow]) -> io::Result<()> {
        match self.format {
            TableFormat::JsonLines => {
                for row in rows {
                    // One object per line, never pretty-printed
                    let line = self.ordered(row);
                    serde_json::to_writer(&mut self.writer, &line).map_err(io::Error::other)?;
                    writeln!(self.writer)?;
                }
            }
            _ => {
                let ordered: Vec<OrderedRow<'_>> =
                    rows.iter().map(|row| self.ordered(row)).collect();
                serde_json::to_writer_pretty(&mut self.writer, &ordered)
                    .map_err(io::Error::other)?;
                writeln!(self.writer)?;
            }
        }
        self.rows_written += rows.len();
        Ok(())
    }

    fn rows_written(&self) -> usize {
        self.rows_written
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
