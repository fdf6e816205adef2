//! External command hooks: certificate issuance before push, reload after
//! push or pull.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::SyncError;

/// Runs a shell command to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command`, inheriting the process environment plus `env`.
    async fn run(&self, command: &str, env: &BTreeMap<String, String>) -> Result<(), SyncError>;
}

/// Runs commands through `sh -c`, with stdout/stderr passed through.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, env: &BTreeMap<String, String>) -> Result<(), SyncError> {
        tracing::debug!("running `{command}`");
        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .envs(env)
            .status()
            .await
            .map_err(|e| SyncError::Hook {
                command: command.to_string(),
                reason: e.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(SyncError::Hook {
                command: command.to_string(),
                reason: status.to_string(),
            })
        }
    }
}
