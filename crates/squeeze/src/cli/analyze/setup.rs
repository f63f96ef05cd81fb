//! Argument checks and config overrides for `analyze`.

use squeeze_core::{Config, TableFormat};
use std::path::Path;

use super::AnalyzeArgs;

/// Report extensions the writer can produce.
const REPORT_EXTENSIONS: [&str; 4] = ["xlsx", "json", "jsonl", "ndjson"];

/// Fail early on paths the pipeline would reject later.
pub fn check_paths(args: &AnalyzeArgs) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!(
            "Input file does not exist: {:?}\n\n  Hint: Check the file path and try again.",
            args.input
        );
    }
    if TableFormat::from_path(&args.input).is_none() {
        anyhow::bail!(
            "Unsupported input format: {:?}\n\n  Hint: Use .xlsx, .xlsm, .xls, .ods, .json or .jsonl.",
            args.input
        );
    }
    if !is_report_path(&args.output) {
        anyhow::bail!(
            "Unsupported report format: {:?}\n\n  Hint: Use .xlsx, .json or .jsonl.",
            args.output
        );
    }
    Ok(())
}

fn is_report_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| REPORT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Apply command-line overrides on top of the loaded config.
pub fn apply_overrides(mut config: Config, args: &AnalyzeArgs) -> Config {
    if let Some(concurrency) = args.fetch_concurrency {
        config.fetch.concurrency = concurrency;
    }
    if let Some(concurrency) = args.optimize_concurrency {
        config.optimize.concurrency = concurrency;
    }
    if let Some(dir) = &args.cache_dir {
        config.general.cache_dir = dir.clone();
    }
    if args.reuse_cache {
        config.fetch.reuse_cached = true;
    }
    if let Some(quality) = args.jpeg_quality {
        config.optimize.jpeg_quality = quality;
    }
    config
}
