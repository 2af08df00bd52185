//! Root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Generate and manage AI notification sounds.
#[derive(Parser)]
#[command(name = "ccbell")]
#[command(about = "Generate notification sounds for coding-agent hooks")]
#[command(version)]
pub struct Cli {
    /// Backend base URL
    #[arg(long = "api-url", env = "CCBELL_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Library snapshot file (default: ~/.ccbell/library.json)
    #[arg(long = "library", env = "CCBELL_LIBRARY_PATH", global = true)]
    pub library: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
