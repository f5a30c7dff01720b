//! CLI argument parsing for netstitch

use crate::role::OperationKind;
use crate::user_functions::FunctionLayout;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for operation summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// Pretty-printed JSON with groups and operations
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "netstitch")]
#[command(version)]
#[command(
    about = "Reconstruct network operations from captured async activity snapshots",
    long_about = None
)]
pub struct Cli {
    /// Activity snapshot (JSON)
    #[arg(value_name = "SNAPSHOT")]
    pub snapshot: PathBuf,

    /// Operation kind to reconstruct (repeatable, overrides the config file)
    #[arg(short = 'k', long = "kind", value_enum, value_name = "KIND")]
    pub kinds: Vec<OperationKind>,

    /// Embed raw activities in operation summaries
    #[arg(long = "include-raw")]
    pub include_raw: bool,

    /// Where user functions are reported
    #[arg(long = "function-layout", value_enum, value_name = "LAYOUT")]
    pub function_layout: Option<FunctionLayout>,

    /// Analysis configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Role signature table replacing the built-in one (TOML)
    #[arg(short = 's', long = "signatures", value_name = "FILE")]
    pub signatures: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}
