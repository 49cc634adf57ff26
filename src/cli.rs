// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `vfswatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "vfswatch",
    version,
    about = "Keep a virtual file system snapshot of build hierarchies in sync with native file watches.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `vfswatch.toml` in the current working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Reconcile once, print the watched hierarchies, and exit.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `VFSWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the hierarchies that would be watched, but
    /// don't register any native watches.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// The `--config` path, or the default location.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }
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
