//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Root of the download and optimized-output cache trees
    pub cache_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("~/.squeeze/cache"),
        }
    }
}

/// Input table settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Leading segment stripped from the raw location to obtain the image URL
    pub location_prefix: String,

    /// Header of the content id column
    pub content_id_column: String,

    /// Header of the image type column
    pub type_column: String,

    /// Header of the template identifier column
    pub template_column: String,

    /// Header of the raw location column
    pub location_column: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            location_prefix: "/image-proxy/".to_string(),
            content_id_column: "content_id".to_string(),
            type_column: "type".to_string(),
            template_column: "template".to_string(),
            location_column: "location".to_string(),
        }
    }
}

impl InputConfig {
    /// Required column headers, in extraction order.
    pub fn required_columns(&self) -> [&str; 4] {
        [
            self.content_id_column.as_str(),
            self.type_column.as_str(),
            self.template_column.as_str(),
            self.location_column.as_str(),
        ]
    }
}

/// Download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Max downloads in flight at once
    pub concurrency: usize,

    /// Per-download timeout in milliseconds
    pub timeout_ms: u64,

    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Max retry attempts for transient failures
    pub retry_attempts: u32,

    /// Base delay between retries in milliseconds
    pub retry_delay_ms: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Reuse a non-empty cached download instead of fetching again
    pub reuse_cached: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            retry_attempts: 2,
            retry_delay_ms: 500,
            user_agent: format!("squeeze/{}", env!("CARGO_PKG_VERSION")),
            reuse_cached: false,
        }
    }
}

/// Optimization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeConfig {
    /// Max optimizations in flight at once
    pub concurrency: usize,

    /// Per-image timeout in milliseconds
    pub timeout_ms: u64,

    /// JPEG re-encode quality (1-100)
    pub jpeg_quality: u8,

    /// PNG compression level: "fast", "default" or "best"
    pub png_compression: String,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            timeout_ms: 60_000,
            jpeg_quality: 80,
            png_compression: "best".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
