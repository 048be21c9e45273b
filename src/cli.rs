//! CLI definitions for walletcore.

use std::path::PathBuf;

use clap::Parser;

/// Walletcore CLI.
#[derive(Parser)]
#[command(name = "walletcore")]
#[command(about = "Run the wallet and peer event handlers")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "WALLETCORE_CONFIG")]
    pub config: Option<PathBuf>,

    /// How long to run the handlers, in milliseconds
    #[arg(long)]
    pub run_ms: Option<u64>,

    /// Also write logs to daily files in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Print the final metrics as JSON
    #[arg(long)]
    pub json: bool,
}
