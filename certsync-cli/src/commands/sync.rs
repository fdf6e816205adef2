//! `certsync push` / `certsync pull`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use certsync_core::Config;
use certsync_daemon::{start_blocking, Completion};
use certsync_engine::{SyncMode, SyncReport, Transfer};

/// Arguments shared by `push` and `pull`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Path to the TOML configuration file.
    #[arg(long, short)]
    pub config: PathBuf,

    /// Report what would be transferred without touching keys, files or the bucket.
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    pub fn run(self, mode: SyncMode) -> Result<()> {
        let config = Config::load(&self.config)
            .with_context(|| format!("failed to load config {}", self.config.display()))?;

        match start_blocking(&config, mode, self.dry_run).with_context(|| format!("{mode} failed"))? {
            Completion::Once(report) => print_report(&report),
            Completion::Stopped(stats) => println!(
                "✓ {mode} daemon stopped after {} run(s), {} failed",
                stats.runs, stats.failures
            ),
        }
        Ok(())
    }
}

fn print_report(report: &SyncReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let mode = report.mode;

    if report.transfers.is_empty() {
        println!("{prefix}✓ {mode} — nothing to do");
        return;
    }

    let verb = match mode {
        SyncMode::Push => "uploaded",
        SyncMode::Pull => "downloaded",
    };
    println!(
        "{prefix}✓ {mode} complete ({} {verb}, {} unchanged, {} skipped)",
        report.transferred(),
        report.unchanged(),
        report.skipped()
    );

    for t in &report.transfers {
        match t {
            Transfer::Transferred { object } => println!("  ✎  {object}"),
            Transfer::WouldTransfer { object } => println!("  ~  {object}"),
            Transfer::Unchanged { object } => println!("  ·  {object}"),
            Transfer::SkippedNoKey { object } => println!("  ?  {object} (no local key)"),
        }
    }
}
