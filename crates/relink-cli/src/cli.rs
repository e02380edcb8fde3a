//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path (defaults to the user config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Supervise a gateway link until interrupted.
    ///
    /// Raw status tokens read from stdin (one per line) are injected as if
    /// the gateway had emitted them, which makes this a usable manual test
    /// harness; real deployments embed the runtime with their own gateway
    /// factory.
    Run {
        /// Log a state snapshot every N seconds
        #[arg(long)]
        report_interval_secs: Option<u64>,
    },
    /// Replay a scripted status sequence and print the resulting snapshots
    Simulate {
        /// Comma-separated steps, each `token@offset_ms` (bare tokens run
        /// 500ms after the previous step)
        #[arg(long)]
        script: Option<String>,
        /// Print snapshots as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load, validate, and print the effective configuration
    CheckConfig {
        /// Print as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}
