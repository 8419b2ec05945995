// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `plandag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "plandag",
    version,
    about = "Validate a task plan and run it with bounded concurrency.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the plan (JSON task map).
    #[arg(long, value_name = "PATH")]
    pub plan: String,

    /// Path to the engine config file (TOML).
    ///
    /// Default: `Plandag.toml` in the current working directory; a missing
    /// file means built-in defaults.
    #[arg(long, value_name = "PATH", default_value = "Plandag.toml")]
    pub config: String,

    /// The request the plan was derived from; passed to every task.
    #[arg(long, value_name = "TEXT", default_value = "")]
    pub request: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PLANDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate and print the execution order and diagram, but don't run
    /// anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the diagram of the final state after running.
    #[arg(long)]
    pub diagram: bool,

    /// Never retry a failed run, regardless of `[retry].auto_fix`.
    #[arg(long)]
    pub no_auto_fix: bool,
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
