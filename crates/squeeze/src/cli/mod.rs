//! Subcommand implementations.

pub mod analyze;
pub mod cache;
pub mod config;
