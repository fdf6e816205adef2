//! Shared engine state and run reports for push and pull.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use certsync_core::{Config, IssueCommand, KeyStore};

use crate::hooks::CommandRunner;
use crate::storage::ObjectStore;

/// Direction of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Local certificate directory → bucket.
    Push,
    /// Bucket → local certificate directory.
    Pull,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Push => f.write_str("push"),
            SyncMode::Pull => f.write_str("pull"),
        }
    }
}

/// Outcome for one encrypted object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Transfer {
    /// Uploaded (push) or downloaded and written (pull).
    Transferred { object: String },
    /// Plaintext hash matches the manifest; nothing moved.
    Unchanged { object: String },
    /// `--dry-run`: the object *would* have been transferred.
    WouldTransfer { object: String },
    /// Pull only: no local key for the object's identity yet.
    SkippedNoKey { object: String },
}

impl Transfer {
    pub fn object(&self) -> &str {
        match self {
            Transfer::Transferred { object }
            | Transfer::Unchanged { object }
            | Transfer::WouldTransfer { object }
            | Transfer::SkippedNoKey { object } => object,
        }
    }
}

/// Summary of one push or pull invocation.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub transfers: Vec<Transfer>,
    /// Push only: a new manifest was written this run.
    pub manifest_published: bool,
}

impl SyncReport {
    pub fn new(mode: SyncMode, dry_run: bool) -> Self {
        Self {
            mode,
            started_at: Utc::now(),
            dry_run,
            transfers: Vec::new(),
            manifest_published: false,
        }
    }

    pub fn transferred(&self) -> usize {
        self.count(|t| matches!(t, Transfer::Transferred { .. } | Transfer::WouldTransfer { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|t| matches!(t, Transfer::Unchanged { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|t| matches!(t, Transfer::SkippedNoKey { .. }))
    }

    /// True when the run moved at least one object.
    pub fn changed(&self) -> bool {
        self.transfers
            .iter()
            .any(|t| matches!(t, Transfer::Transferred { .. }))
    }

    fn count(&self, pred: impl Fn(&Transfer) -> bool) -> usize {
        self.transfers.iter().filter(|t| pred(t)).count()
    }
}

/// Everything a push or pull needs: storage, hooks, keys and local paths.
///
/// Runs are strictly sequential; one object is transferred at a time.
pub struct Engine<S, R> {
    pub(crate) store: S,
    pub(crate) runner: R,
    pub(crate) keys: KeyStore,
    pub(crate) cert_dir: PathBuf,
    pub(crate) prefix: String,
    pub(crate) reload_cmd: Option<String>,
    pub(crate) issue_commands: Vec<IssueCommand>,
}

impl<S: ObjectStore, R: CommandRunner> Engine<S, R> {
    pub fn new(store: S, runner: R, keys: KeyStore, cert_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            runner,
            keys,
            cert_dir: cert_dir.into(),
            prefix: String::new(),
            reload_cmd: None,
            issue_commands: Vec::new(),
        }
    }

    /// Engine wired from a loaded configuration.
    pub fn from_config(config: &Config, store: S, runner: R) -> Self {
        Self::new(store, runner, KeyStore::new(&config.key_dir), &config.cert_dir)
            .with_prefix(&config.s3.prefix)
            .with_reload_command(config.reload_command())
            .with_issue_commands(config.issue_commands.clone())
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.trim_end_matches('/').to_string();
        self
    }

    pub fn with_reload_command(mut self, command: Option<&str>) -> Self {
        self.reload_cmd = command.map(str::to_string);
        self
    }

    pub fn with_issue_commands(mut self, commands: Vec<IssueCommand>) -> Self {
        self.issue_commands = commands;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cert_dir(&self) -> &Path {
        &self.cert_dir
    }

    /// Run the configured reload hook, if any, with no extra environment.
    pub(crate) async fn reload(&self) -> Result<(), crate::SyncError> {
        let Some(command) = self.reload_cmd.as_deref() else {
            return Ok(());
        };
        self.runner.run(command, &Default::default()).await?;
        tracing::info!("reload command succeeded");
        Ok(())
    }
}
