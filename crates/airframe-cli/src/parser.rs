//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for the airframe inference gateway.
///
/// Global options override the matching `AIRFRAME_*` environment variables.
#[derive(Parser)]
#[command(name = "airframe")]
#[command(about = "Probe, list and query LLM inference endpoints")]
#[command(version)]
pub struct Cli {
    /// Endpoint document (JSON list, or YAML with the fallback enabled)
    #[arg(long, global = true, env = "AIRFRAME_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Attempts per inference exchange, including the first
    #[arg(long = "max-attempts", global = true)]
    pub max_attempts: Option<u32>,

    /// Health probe deadline in milliseconds
    #[arg(long = "probe-timeout-ms", global = true)]
    pub probe_timeout_ms: Option<u64>,

    /// Per-attempt inference deadline in seconds
    #[arg(long = "request-timeout", global = true)]
    pub request_timeout_secs: Option<u64>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
