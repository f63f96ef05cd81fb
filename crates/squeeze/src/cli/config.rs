//! The `squeeze config` command.

use clap::{Args, Subcommand};
use squeeze_core::Config;
use std::path::{Path, PathBuf};

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Print the config file location
    Path,

    /// Write a config file with default values
    Init {
        /// Replace an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Parse and validate a config file without running anything
    Check {
        /// File to check (defaults to the standard location)
        file: Option<PathBuf>,
    },
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => println!("{}", Config::load()?.to_toml()?),
        ConfigCommand::Path => println!("{}", Config::default_path().display()),
        ConfigCommand::Init { force } => {
            let path = Config::default_path();
            write_default(&path, force)?;
            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }
        ConfigCommand::Check { file } => {
            let path = file.unwrap_or_else(Config::default_path);
            Config::load_from(&path)?;
            println!("{} is valid", path.display());
        }
    }
    Ok(())
}

fn write_default(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, Config::default().to_toml()?)?;
    Ok(())
}
