//! Spreadsheet tables: read with `calamine`, written with `rust_xlsxwriter`.

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;
use std::path::Path;

use super::{parse_error, read_error, write_error, Cell, RawRow, TableRow};
use crate::error::{InputError, ReportError};

/// Row limit of the xlsx format, header included.
const MAX_XLSX_ROWS: usize = 1_048_576;

/// Read the first worksheet. The first row is the header; fully blank rows
/// are skipped.
pub fn read_rows(path: &Path) -> Result<Vec<RawRow>, InputError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| read_error(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| parse_error(path, "workbook has no worksheets"))?
        .map_err(|e| parse_error(path, e))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(vec![]);
    };
    let headers: Vec<String> = header
        .iter()
        .map(|cell| cell_text(cell).trim().to_string())
        .collect();

    let mut out = Vec::new();
    for row in rows {
        if row.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }
        let mut raw = RawRow::with_capacity(headers.len());
        for (idx, name) in headers.iter().enumerate() {
            if name.is_empty() {
                continue;
            }
            let value = row.get(idx).map(cell_text).unwrap_or_default();
            raw.insert(name.clone(), value);
        }
        out.push(raw);
    }

    tracing::debug!("Read {} row(s) from {:?}", out.len(), path);
    Ok(out)
}

/// Write a header row followed by one row per entry. Absent cells stay empty.
pub fn write_rows(path: &Path, rows: &[TableRow], columns: &[&str]) -> Result<(), ReportError> {
    if rows.len() >= MAX_XLSX_ROWS {
        return Err(write_error(
            path,
            format!("{} rows exceed the spreadsheet row limit", rows.len()),
        ));
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, name) in columns.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, *name)
            .map_err(|e| write_error(path, e))?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let row_num = (idx + 1) as u32;
        for (col, name) in columns.iter().enumerate() {
            let col = col as u16;
            let written = match row.get(*name) {
                Some(Cell::Text(text)) => worksheet.write_string(row_num, col, text.as_str()),
                Some(Cell::Integer(value)) => worksheet.write_number(row_num, col, *value as f64),
                Some(Cell::Float(value)) => worksheet.write_number(row_num, col, *value),
                None => continue,
            };
            written.map_err(|e| write_error(path, e))?;
        }
    }

    workbook.save(path).map_err(|e| write_error(path, e))?;
    Ok(())
}

/// Render a cell as text. Whole-number floats lose their `.0`.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        Data::Int(value) => value.to_string(),
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 9.0e15 => {
            format!("{}", *value as i64)
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, Cell)]) -> TableRow {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("abc".into())), "abc");
        assert_eq!(cell_text(&Data::Int(7)), "7");
        assert_eq!(cell_text(&Data::Float(12345.0)), "12345");
        assert_eq!(cell_text(&Data::Float(0.25)), "0.25");
    }

    #[test]
    fn test_written_report_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        let columns = ["content_id", "url", "original_size"];
        let rows = vec![
            row(&[
                ("content_id", Cell::Text("1001".into())),
                ("url", Cell::Text("https://cdn.example.com/a.jpg".into())),
                ("original_size", Cell::Integer(1000)),
            ]),
            row(&[
                ("content_id", Cell::Text("1002".into())),
                ("url", Cell::Text("https://cdn.example.com/b.jpg".into())),
            ]),
        ];

        write_rows(&path, &rows, &columns).unwrap();
        let read = read_rows(&path).unwrap();

        assert_eq!(read.len(), 2);
        assert_eq!(read[0]["content_id"], "1001");
        assert_eq!(read[0]["original_size"], "1000");
        assert_eq!(read[1]["url"], "https://cdn.example.com/b.jpg");
        assert_eq!(read[1]["original_size"], "");
    }

    #[test]
    fn test_header_only_sheet_has_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");
        write_rows(&path, &[], &["content_id", "location"]).unwrap();
        assert!(read_rows(&path).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = read_rows(Path::new("/nonexistent/input.xlsx")).unwrap_err();
        assert!(matches!(err, InputError::Read { .. }));
    }

    #[test]
    fn test_non_spreadsheet_bytes_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.xlsx");
        std::fs::write(&path, b"not a zip archive").unwrap();
        assert!(read_rows(&path).is_err());
    }
}
