//! The `squeeze analyze` command.

mod progress;
mod setup;
mod summary;

use clap::Args;
use squeeze_core::{CancellationToken, PipelineBuilder};
use std::path::PathBuf;
use std::sync::Arc;

use progress::ProgressObserver;
use setup::{apply_overrides, check_paths};
use summary::print_summary;

/// Arguments for the `analyze` command.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Input table (.xlsx, .xlsm, .xls, .ods, .json, .jsonl)
    pub input: PathBuf,

    /// Report to write (.xlsx, .json, .jsonl)
    pub output: PathBuf,

    /// Maximum concurrent downloads
    #[arg(long)]
    pub fetch_concurrency: Option<usize>,

    /// Maximum concurrent optimizations
    #[arg(long)]
    pub optimize_concurrency: Option<usize>,

    /// Cache directory for downloads and optimized files
    #[arg(long, env = "SQUEEZE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Reuse cached downloads instead of fetching them again
    #[arg(long)]
    pub reuse_cache: bool,

    /// JPEG re-encode quality (1-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: Option<u8>,

    /// Hide progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Print the run summary as JSON to stdout
    #[arg(long)]
    pub summary_json: bool,
}

/// Execute the analyze command.
pub async fn execute(args: AnalyzeArgs) -> anyhow::Result<()> {
    check_paths(&args)?;
    let config = apply_overrides(squeeze_core::Config::load()?, &args);

    let progress = Arc::new(ProgressObserver::new(!args.no_progress));
    let mut pipeline = PipelineBuilder::new(config)
        .observer(progress.clone())
        .build()?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after work in flight");
            interrupt.cancel();
        }
    });

    tracing::info!("Analyzing {:?} -> {:?}", args.input, args.output);
    let result = pipeline.run(&args.input, &args.output, &cancel).await;
    progress.finish();
    let summary = result?;

    if args.summary_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    print_summary(&summary);
    eprintln!("  Report written to {}", args.output.display());
    Ok(())
}
