//! Row extraction: raw table rows to image records.

use std::path::Path;

use crate::config::InputConfig;
use crate::error::InputError;
use crate::tabular::RawRow;
use crate::types::ImageRecord;

/// Category for templates missing from the known table.
pub const UNKNOWN_CATEGORY: &str = "UNK";

/// Known template identifiers and their categories.
const TEMPLATE_CATEGORIES: [(&str, &str); 8] = [
    ("gloBnUtilityImage", "Utility"),
    ("gloBnHeroImage", "Hero"),
    ("gloBnBannerImage", "Banner"),
    ("gloBnThumbnailImage", "Thumbnail"),
    ("gloBnPromoImage", "Promo"),
    ("gloBnBackgroundImage", "Background"),
    ("gloBnIconImage", "Icon"),
    ("gloBnGalleryImage", "Gallery"),
];

/// Map a template identifier to its category. Never fails.
pub fn template_category(template: &str) -> &'static str {
    let template = template.trim();
    TEMPLATE_CATEGORIES
        .iter()
        .find(|(known, _)| *known == template)
        .map(|(_, category)| *category)
        .unwrap_or(UNKNOWN_CATEGORY)
}

/// Turn a raw location into an absolute URL.
///
/// Strips `prefix` when present and gives protocol-relative results an
/// `https:` scheme.
pub fn normalize_location(raw: &str, prefix: &str) -> String {
    let trimmed = raw.trim();
    let stripped = if prefix.is_empty() {
        trimmed
    } else {
        trimmed.strip_prefix(prefix).unwrap_or(trimmed)
    };

    if stripped.starts_with("//") {
        format!("https:{stripped}")
    } else {
        stripped.to_string()
    }
}

/// Builds one [`ImageRecord`] per input row.
pub struct RowExtractor {
    config: InputConfig,
}

impl RowExtractor {
    pub fn new(config: InputConfig) -> Self {
        Self { config }
    }

    /// Extract records in input order.
    ///
    /// `source` names the table in error messages. A required column that no
    /// row carries is an error; an empty cell in an individual row is not.
    pub fn extract(&self, source: &Path, rows: &[RawRow]) -> Result<Vec<ImageRecord>, InputError> {
        if !rows.is_empty() {
            for column in self.config.required_columns() {
                if !rows.iter().any(|row| row.contains_key(column)) {
                    return Err(InputError::MissingColumn {
                        path: source.to_path_buf(),
                        column: column.to_string(),
                    });
                }
            }
        }

        let records: Vec<ImageRecord> = rows.iter().map(|row| self.record_from(row)).collect();

        let unknown = records
            .iter()
            .filter(|r| r.image_field == UNKNOWN_CATEGORY)
            .count();
        if unknown > 0 {
            tracing::debug!("{unknown} row(s) with an unrecognized template");
        }
        tracing::info!("Extracted {} record(s) from {:?}", records.len(), source);
        Ok(records)
    }

    fn record_from(&self, row: &RawRow) -> ImageRecord {
        let cell = |column: &str| row.get(column).map(|v| v.trim()).unwrap_or_default();

        let template = cell(self.config.template_column.as_str());
        let url = normalize_location(
            cell(self.config.location_column.as_str()),
            &self.config.location_prefix,
        );
        if url.is_empty() {
            tracing::warn!(
                "Row with content id '{}' has an empty location",
                cell(self.config.content_id_column.as_str())
            );
        }

        ImageRecord::new(
            cell(self.config.content_id_column.as_str()),
            cell(self.config.type_column.as_str()),
            template_category(template),
            template,
            url,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, &str)]) -> RawRow {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_row(id: &str, template: &str, location: &str) -> RawRow {
        row(&[
            ("content_id", id),
            ("type", "hero"),
            ("template", template),
            ("location", location),
        ])
    }

    fn extractor() -> RowExtractor {
        RowExtractor::new(InputConfig::default())
    }

    #[test]
    fn test_known_templates() {
        assert_eq!(template_category("gloBnUtilityImage"), "Utility");
        assert_eq!(template_category("gloBnHeroImage"), "Hero");
        assert_eq!(template_category(" gloBnGalleryImage "), "Gallery");
    }

    #[test]
    fn test_unknown_template_is_unk() {
        assert_eq!(template_category("foo"), "UNK");
        assert_eq!(template_category(""), "UNK");
        assert_eq!(template_category("globnheroimage"), "UNK");
        assert_eq!(template_category("\u{0}\u{fffd}"), "UNK");
    }

    #[test]
    fn test_normalize_strips_prefix() {
        assert_eq!(
            normalize_location("/image-proxy/https://cdn.example.com/a.jpg", "/image-proxy/"),
            "https://cdn.example.com/a.jpg"
        );
    }

    #[test]
    fn test_normalize_protocol_relative() {
        assert_eq!(
            normalize_location("  /image-proxy///cdn.example.com/a.jpg ", "/image-proxy/"),
            "https://cdn.example.com/a.jpg"
        );
    }

    #[test]
    fn test_normalize_without_prefix_is_untouched() {
        assert_eq!(
            normalize_location("https://cdn.example.com/a.jpg", "/image-proxy/"),
            "https://cdn.example.com/a.jpg"
        );
        assert_eq!(normalize_location("https://x/a.png", ""), "https://x/a.png");
    }

    #[test]
    fn test_extract_one_record_per_row_in_order() {
        let rows = vec![
            full_row("1", "gloBnHeroImage", "/image-proxy/https://cdn.example.com/a.jpg"),
            full_row("2", "foo", "/image-proxy/https://cdn.example.com/b.png"),
            full_row("3", "gloBnIconImage", "/image-proxy/https://cdn.example.com/a.jpg"),
        ];
        let records = extractor().extract(Path::new("in.xlsx"), &rows).unwrap();

        assert_eq!(records.len(), 3);
        let ids: Vec<&str> = records.iter().map(|r| r.content_id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert_eq!(records[0].image_field, "Hero");
        assert_eq!(records[1].image_field, "UNK");
        assert_eq!(records[1].template, "foo");
        assert_eq!(records[1].file_extension, "png");
        // Same URL, same hash
        assert_eq!(records[0].content_hash, records[2].content_hash);
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let rows = vec![row(&[("content_id", "1"), ("type", "hero"), ("template", "x")])];
        let err = extractor().extract(Path::new("in.xlsx"), &rows).unwrap_err();
        match err {
            InputError::MissingColumn { column, .. } => assert_eq!(column, "location"),
            other => panic!("Expected missing column, got {other}"),
        }
    }

    #[test]
    fn test_sparse_cells_are_allowed() {
        let rows = vec![
            full_row("1", "gloBnHeroImage", "https://cdn.example.com/a.jpg"),
            row(&[("content_id", "2"), ("location", "https://cdn.example.com/b.jpg")]),
        ];
        let records = extractor().extract(Path::new("in.json"), &rows).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].template, "");
        assert_eq!(records[1].image_field, "UNK");
    }

    #[test]
    fn test_empty_table_yields_no_records() {
        let records = extractor().extract(Path::new("in.xlsx"), &[]).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_custom_columns() {
        let config = InputConfig {
            location_column: "Image URL".to_string(),
            location_prefix: String::new(),
            ..InputConfig::default()
        };
        let rows = vec![row(&[
            ("content_id", "9"),
            ("type", "promo"),
            ("template", "gloBnPromoImage"),
            ("Image URL", "https://cdn.example.com/p.jpg"),
        ])];
        let records = RowExtractor::new(config)
            .extract(Path::new("in.xlsx"), &rows)
            .unwrap();
        assert_eq!(records[0].source_url, "https://cdn.example.com/p.jpg");
        assert_eq!(records[0].image_field, "Promo");
    }
}
