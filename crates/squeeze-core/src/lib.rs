//! Squeeze Core - bulk image optimization analysis.
//!
//! Squeeze reads a table of image locations, downloads every image, re-encodes
//! it and reports how many bytes optimization would save per image.
//!
//! # Architecture
//!
//! A run is a strictly sequential chain of stages. Only the fetch and
//! optimize stages are concurrent, each with its own bounded pool:
//!
//! ```text
//! Table → Extract → Fetch (fail-fast, N workers) → Optimize (soft-fail, M workers) → Report
//! ```
//!
//! Downloads and optimized outputs are cached under a directory partitioned
//! by the BLAKE3 hash of each image URL.
//!
//! # Usage
//!
//! ```rust,ignore
//! use squeeze_core::{CancellationToken, Config, Pipeline};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> squeeze_core::Result<()> {
//!     let config = Config::load()?;
//!     let mut pipeline = Pipeline::from_config(config)?;
//!
//!     let summary = pipeline
//!         .run(Path::new("images.xlsx"), Path::new("report.xlsx"), &CancellationToken::new())
//!         .await?;
//!     println!("Saved {} bytes", summary.saved_bytes());
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod codec;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod remote;
pub mod report;
pub mod tabular;
pub mod types;

// Re-exports for convenient access
pub use codec::{ImageOptimizer, Optimizer};
pub use config::Config;
pub use error::{
    ConfigError, FetchError, InputError, OptimizeError, ReportError, Result, SqueezeError,
};
pub use pipeline::{
    NoopObserver, Pipeline, PipelineBuilder, PipelineObserver, PipelineState, Stage,
};
pub use remote::{Fetcher, HttpFetcher};
pub use report::{ReportWriter, REPORT_COLUMNS};
pub use tabular::{FileTable, RawRow, TableFormat, TableReader, TableWriter};
pub use tokio_util::sync::CancellationToken;
pub use types::{ImageRecord, OptimizedFile, RunSummary};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_pipeline_from_default_config() {
        let pipeline = Pipeline::from_config(Config::default()).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Extracting);
        assert!(pipeline.history().is_empty());
    }
}
