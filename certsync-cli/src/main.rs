//! certsync — encrypted TLS certificate sync between a directory and S3.
//!
//! # Usage
//!
//! ```text
//! certsync push --config <path> [--dry-run]
//! certsync pull --config <path> [--dry-run]
//! ```
//!
//! With `[daemon] enabled = true` in the config, either command keeps
//! running and repeats on the configured interval until SIGINT/SIGTERM.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use certsync_engine::SyncMode;
use commands::sync::SyncArgs;

#[derive(Parser, Debug)]
#[command(
    name = "certsync",
    version,
    about = "Sync encrypted TLS certificates and keys through an S3 bucket",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run issuance commands, then encrypt and upload changed certificate files.
    Push(SyncArgs),

    /// Download and decrypt changed certificate files.
    Pull(SyncArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Push(args) => args.run(SyncMode::Push),
        Commands::Pull(args) => args.run(SyncMode::Pull),
    }
}
