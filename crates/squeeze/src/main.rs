//! Squeeze CLI - estimate image optimization savings in bulk.
//!
//! Squeeze reads a spreadsheet of image locations, downloads and re-encodes
//! every image, and writes a report with the original size, optimized size
//! and savings per image.
//!
//! # Usage
//!
//! ```bash
//! # Analyze a spreadsheet
//! squeeze analyze images.xlsx report.xlsx
//!
//! # Re-run against the warm download cache
//! squeeze analyze images.xlsx report.xlsx --reuse-cache
//!
//! # View configuration
//! squeeze config show
//!
//! # Remove cached downloads
//! squeeze cache clear
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Squeeze - estimate image optimization savings for a spreadsheet of image URLs.
#[derive(Parser, Debug)]
#[command(name = "squeeze")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Download, optimize and report on every image in an input table
    Analyze(cli::analyze::AnalyzeArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),

    /// Inspect or clear the download cache
    Cache(cli::cache::CacheArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match squeeze_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `squeeze config path`."
            );
            squeeze_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Squeeze v{}", squeeze_core::VERSION);

    match cli.command {
        Commands::Analyze(args) => cli::analyze::execute(args).await,
        Commands::Config(args) => cli::config::execute(args).await,
        Commands::Cache(args) => cli::cache::execute(args).await,
    }
}
