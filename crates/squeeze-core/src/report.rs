//! Projection of finished records onto the report columns.

use std::path::Path;
use std::sync::Arc;

use crate::error::ReportError;
use crate::tabular::{Cell, TableRow, TableWriter};
use crate::types::ImageRecord;

/// Report columns, in output order.
pub const REPORT_COLUMNS: [&str; 9] = [
    "content_id",
    "image_type",
    "image_field",
    "template",
    "url",
    "original_size",
    "optimized_size",
    "optimization_diff",
    "optimization_pct",
];

/// Writes one report row per record through a [`TableWriter`].
#[derive(Clone)]
pub struct ReportWriter {
    writer: Arc<dyn TableWriter>,
}

impl ReportWriter {
    pub fn new(writer: Arc<dyn TableWriter>) -> Self {
        Self { writer }
    }

    /// Write all records to `path`.
    pub fn write(&self, path: &Path, records: &[ImageRecord]) -> Result<(), ReportError> {
        let rows: Vec<TableRow> = records.iter().map(project).collect();
        self.writer.write_table(path, &rows, &REPORT_COLUMNS)?;
        tracing::info!("Report written: {} row(s) to {:?}", rows.len(), path);
        Ok(())
    }
}

/// Project a record onto the report columns.
///
/// Unset sizes and empty text are left out of the row entirely.
pub fn project(record: &ImageRecord) -> TableRow {
    let mut row = TableRow::new();

    let text_cells = [
        ("content_id", &record.content_id),
        ("image_type", &record.image_type),
        ("image_field", &record.image_field),
        ("template", &record.template),
        ("url", &record.source_url),
    ];
    for (column, value) in text_cells {
        if !value.is_empty() {
            row.insert(column.to_string(), Cell::Text(value.clone()));
        }
    }

    if let Some(size) = record.original_size_bytes {
        row.insert("original_size".to_string(), Cell::Integer(size as i64));
    }
    if let Some(size) = record.optimized_size_bytes {
        row.insert("optimized_size".to_string(), Cell::Integer(size as i64));
    }
    row.insert(
        "optimization_diff".to_string(),
        Cell::Integer(record.size_delta_bytes),
    );
    row.insert(
        "optimization_pct".to_string(),
        Cell::Float(record.size_delta_pct),
    );

    row
}
