// src/cli.rs

//! CLI argument parsing using `clap` (derive feature).

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `jobdeck`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jobdeck",
    version,
    about = "Launch dataset generation and training scripts and follow their output.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Jobdeck.toml` in the current working directory; if that file
    /// does not exist, built-in defaults are used.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `JOBDECK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and validate the config, print the commands the forms would run,
    /// but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
