//! Error types for the Squeeze analysis pipeline.
//!
//! Errors are organized by stage so that the message surfaced to the user
//! names the file or URL involved and what went wrong with it.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Squeeze operations.
///
/// Every variant is fatal for the run. Per-image optimization failures are
/// represented by [`OptimizeError`] and never reach this type.
#[derive(Error, Debug)]
pub enum SqueezeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The input table could not be read
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// A download failed and aborted the fetch stage
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The report could not be written
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors reading the input table.
#[derive(Error, Debug)]
pub enum InputError {
    /// The file could not be opened or read
    #[error("Failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// The file was read but is not tabular data
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A required column does not appear anywhere in the table
    #[error("Missing required column '{column}' in {path}")]
    MissingColumn { path: PathBuf, column: String },

    /// File extension does not map to a known table format
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(PathBuf),
}

/// Errors raised while downloading images into the cache.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection failure or non-success HTTP status
    #[error("Download failed for {url}: {message}")]
    Network {
        url: String,
        message: String,
        status_code: Option<u16>,
    },

    /// The cache partition directory could not be created
    #[error("Failed to create cache directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the downloaded bytes failed
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single download exceeded its time budget
    #[error("Download of {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    /// A download task terminated abnormally
    #[error("Download task failed: {0}")]
    Task(String),

    /// The run was cancelled while downloads were in flight
    #[error("Fetch cancelled")]
    Cancelled,
}

/// Per-image optimization failures. Always recovered inside the optimize stage.
#[derive(Error, Debug)]
pub enum OptimizeError {
    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Re-encoding failed
    #[error("Encode error for {path}: {message}")]
    Encode { path: PathBuf, message: String },

    /// The codec has no optimizer for this format
    #[error("Unsupported format for {path}: {format}")]
    Unsupported { path: PathBuf, format: String },

    /// Optimization exceeded its time budget
    #[error("Optimization of {path} timed out after {timeout_ms}ms")]
    Timeout { path: PathBuf, timeout_ms: u64 },

    /// The optimizer task panicked
    #[error("Optimizer panicked on {path}")]
    Panicked { path: PathBuf },

    /// The optimize task died outside the optimizer call
    #[error("Optimize task failed: {0}")]
    Task(String),

    /// Reading the source or writing the output failed
    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors writing the output report.
#[derive(Error, Debug)]
pub enum ReportError {
    /// The underlying writer failed
    #[error("Failed to write report {path}: {message}")]
    Write { path: PathBuf, message: String },

    /// File extension does not map to a known table format
    #[error("Unsupported report format: {0}")]
    UnsupportedFormat(PathBuf),
}

/// Convenience type alias for Squeeze results.
pub type Result<T> = std::result::Result<T, SqueezeError>;
