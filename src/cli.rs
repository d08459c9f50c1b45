// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `jobhost`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jobhost",
    version,
    about = "Load, validate and run sandboxed job scripts.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Jobhost.toml` in the current working directory if it
    /// exists, built-in defaults otherwise.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Jobs directory; overrides `[engine].jobs_dir`.
    #[arg(long, value_name = "DIR")]
    pub jobs_dir: Option<String>,

    /// Submit a script file at runtime (repeatable).
    #[arg(long, value_name = "FILE")]
    pub submit: Vec<String>,

    /// Exit once every job has finished instead of idling until Ctrl-C.
    #[arg(long)]
    pub once: bool,

    /// Load and validate the jobs directory, report per file, run nothing.
    #[arg(long)]
    pub check: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `JOBHOST_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
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
