//! Core data types for the Squeeze analysis pipeline.
//!
//! An [`ImageRecord`] is created once per input row, filled in by the fetch
//! and optimize stages, and finally projected onto the report columns.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pipeline::hash::Hasher;

/// One image's metadata and processing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    // === Input metadata (copied through untouched) ===
    /// Content id from the input row
    pub content_id: String,

    /// Image type from the input row
    pub image_type: String,

    /// Human-readable category derived from `template`
    pub image_field: String,

    /// Raw template identifier from the input row
    pub template: String,

    // === Derived from the location ===
    /// Normalized absolute URL of the image
    pub source_url: String,

    /// Filesystem-safe file name taken from the URL path
    pub file_name: String,

    /// Lowercased extension of `file_name` (empty if none)
    pub file_extension: String,

    /// BLAKE3 digest of `source_url`; cache partition and dedup key
    pub content_hash: String,

    // === Processing state ===
    /// Location of the downloaded bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,

    /// Location of the optimized bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized_path: Option<PathBuf>,

    /// Size of the download, set once by the fetch stage
    pub original_size_bytes: Option<u64>,

    /// Size of the optimized file, set once by the optimize stage
    pub optimized_size_bytes: Option<u64>,

    /// `original_size_bytes - optimized_size_bytes`
    pub size_delta_bytes: i64,

    /// `size_delta_bytes / original_size_bytes`
    pub size_delta_pct: f64,
}

impl ImageRecord {
    /// Create a record for a normalized URL.
    ///
    /// File name, extension and content hash are derived here and never
    /// recomputed.
    pub fn new(
        content_id: impl Into<String>,
        image_type: impl Into<String>,
        image_field: impl Into<String>,
        template: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        let source_url = source_url.into();
        let file_name = file_name_from_url(&source_url);
        let file_extension = Path::new(&file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let content_hash = Hasher::url_hash(&source_url);

        Self {
            content_id: content_id.into(),
            image_type: image_type.into(),
            image_field: image_field.into(),
            template: template.into(),
            source_url,
            file_name,
            file_extension,
            content_hash,
            cache_path: None,
            optimized_path: None,
            original_size_bytes: None,
            optimized_size_bytes: None,
            size_delta_bytes: 0,
            size_delta_pct: 0.0,
        }
    }

    /// Whether the fetch stage has recorded a download for this record.
    pub fn is_fetched(&self) -> bool {
        self.cache_path.is_some() && self.original_size_bytes.is_some()
    }

    /// Whether the optimize stage has recorded a smaller output.
    pub fn is_optimized(&self) -> bool {
        self.optimized_size_bytes.is_some()
    }

    /// Record the downloaded file. Returns `false` if already recorded.
    pub(crate) fn record_fetch(&mut self, path: PathBuf, size: u64) -> bool {
        if self.original_size_bytes.is_some() {
            tracing::warn!(
                "Ignoring second fetch result for {} (content id {})",
                self.source_url,
                self.content_id
            );
            return false;
        }
        self.cache_path = Some(path);
        self.original_size_bytes = Some(size);
        true
    }

    /// Record the optimized file and derive the savings metrics.
    ///
    /// Returns `false` if the record was never fetched or was already
    /// optimized; the record is left untouched in that case.
    pub(crate) fn record_optimization(&mut self, path: PathBuf, size: u64) -> bool {
        let Some(original) = self.original_size_bytes else {
            return false;
        };
        if self.optimized_size_bytes.is_some() {
            tracing::warn!(
                "Ignoring second optimization result for {} (content id {})",
                self.source_url,
                self.content_id
            );
            return false;
        }
        let delta = original as i64 - size as i64;
        self.optimized_path = Some(path);
        self.optimized_size_bytes = Some(size);
        self.size_delta_bytes = delta;
        self.size_delta_pct = if original == 0 {
            0.0
        } else {
            delta as f64 / original as f64
        };
        true
    }
}

/// Derive a filesystem-safe file name from the last URL path segment.
fn file_name_from_url(url: &str) -> String {
    let path = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let last = path.rsplit('/').next().unwrap_or_default();
    let sanitized: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        "index".to_string()
    } else {
        cap_file_name(sanitized)
    }
}

/// Longest file name derived from a URL. Leaves room for the `.part`
/// suffix under the common 255-byte file name limit.
const MAX_FILE_NAME_BYTES: usize = 200;

/// Extensions longer than this are treated as part of the stem.
const MAX_EXTENSION_BYTES: usize = 16;

/// Truncate the stem of an over-long name, keeping a short extension.
///
/// `name` is already sanitized to ASCII, so byte slicing is safe.
fn cap_file_name(name: String) -> String {
    if name.len() <= MAX_FILE_NAME_BYTES {
        return name;
    }
    match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= MAX_EXTENSION_BYTES + 1 => {
            let ext = &name[dot..];
            let stem = &name[..MAX_FILE_NAME_BYTES - ext.len()];
            format!("{stem}{ext}")
        }
        _ => name[..MAX_FILE_NAME_BYTES].to_string(),
    }
}

/// A file produced by the optimizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizedFile {
    /// Where the optimized bytes were written
    pub path: PathBuf,

    /// Size reported by the optimizer
    pub size: u64,
}

/// Statistics for a completed pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Records extracted from the input (equals report rows)
    pub records: usize,

    /// Unique downloads performed
    pub fetched: usize,

    /// Unique downloads served from an existing cache file
    pub cache_hits: usize,

    /// Records with a smaller optimized file
    pub optimized: usize,

    /// Records the optimizer could not shrink
    pub no_gain: usize,

    /// Records whose optimization failed or was skipped
    pub failed: usize,

    /// Sum of original sizes over all fetched records
    pub total_original_bytes: u64,

    /// Sum of sizes after optimization (original size when not optimized)
    pub total_optimized_bytes: u64,

    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl RunSummary {
    /// Fill the byte totals from the final record set.
    pub fn tally(&mut self, records: &[ImageRecord]) {
        self.records = records.len();
        self.total_original_bytes = 0;
        self.total_optimized_bytes = 0;
        for record in records {
            let Some(original) = record.original_size_bytes else {
                continue;
            };
            self.total_original_bytes += original;
            self.total_optimized_bytes += record.optimized_size_bytes.unwrap_or(original);
        }
    }

    /// Bytes saved across the whole run.
    pub fn saved_bytes(&self) -> u64 {
        self.total_original_bytes
            .saturating_sub(self.total_optimized_bytes)
    }

    /// Fraction of bytes saved across the whole run (0.0 when nothing was fetched).
    pub fn saved_fraction(&self) -> f64 {
        if self.total_original_bytes == 0 {
            0.0
        } else {
            self.saved_bytes() as f64 / self.total_original_bytes as f64
        }
    }
}
