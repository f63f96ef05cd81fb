//! The `squeeze cache` command.

use clap::{Args, Subcommand};
use squeeze_core::Config;
use std::path::Path;
use walkdir::WalkDir;

/// Arguments for the `cache` command.
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Print the cache root
    Path,

    /// Delete cached downloads and optimized files
    Clear,
}

/// Execute the cache command.
pub async fn execute(args: CacheArgs) -> anyhow::Result<()> {
    let config = Config::load()?;
    match args.command {
        CacheCommand::Path => println!("{}", config.cache_dir().display()),
        CacheCommand::Clear => {
            let freed = clear(&config)?;
            println!(
                "Cleared {} ({} bytes freed)",
                config.cache_dir().display(),
                freed
            );
        }
    }
    Ok(())
}

/// Remove both cache trees, returning the bytes they held.
fn clear(config: &Config) -> anyhow::Result<u64> {
    let mut freed = 0;
    for dir in [config.download_dir(), config.optimized_dir()] {
        if !dir.exists() {
            continue;
        }
        freed += dir_size(&dir)?;
        std::fs::remove_dir_all(&dir)?;
        tracing::debug!("Removed {:?}", dir);
    }
    Ok(freed)
}

/// Total size of the regular files under `dir`.
fn dir_size(dir: &Path) -> walkdir::Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}
