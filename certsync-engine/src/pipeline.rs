//! Shared sync pipeline entrypoint used by the CLI and the daemon.

use certsync_core::Config;

use crate::engine::{Engine, SyncMode, SyncReport};
use crate::error::SyncError;
use crate::hooks::ShellRunner;
use crate::storage::S3Store;

/// Run one push or pull against the configured bucket.
///
/// A fresh storage client is built per invocation, so a daemon recovers from
/// transient connection setup failures on the next tick.
pub async fn run(config: &Config, mode: SyncMode, dry_run: bool) -> Result<SyncReport, SyncError> {
    let store = S3Store::connect(&config.s3).await?;
    let engine = Engine::from_config(config, store, ShellRunner);
    match mode {
        SyncMode::Push => engine.push(dry_run).await,
        SyncMode::Pull => {
            if !config.issue_commands.is_empty() {
                tracing::warn!(
                    "ignoring {} issue command(s): only push runs them",
                    config.issue_commands.len()
                );
            }
            engine.pull(dry_run).await
        }
    }
}
