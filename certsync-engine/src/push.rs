//! Push — local certificate directory → encrypted objects + manifest.
//!
//! 1. Run issuance commands (failures are logged, never fatal).
//! 2. Fetch the current manifest.
//! 3. Group certificate artifacts in `cert_dir` by identity.
//! 4. Per identity: get-or-create its key; per file: hash the plaintext,
//!    skip when the manifest already has that hash, otherwise seal + upload.
//! 5. If anything was uploaded, publish a manifest rebuilt from scratch
//!    (entries for vanished files drop out).
//! 6. Run the reload hook; its failure fails the run.

use std::collections::BTreeMap;
use std::path::Path;

use certsync_core::CertIdentity;

use crate::cipher;
use crate::engine::{Engine, SyncMode, SyncReport, Transfer};
use crate::error::{io_err, SyncError};
use crate::hooks::CommandRunner;
use crate::manifest::{self, digest, encrypted_name, Manifest};
use crate::storage::{object_key, ObjectStore};

/// Certificate artifact filenames grouped by identity, both levels sorted.
pub(crate) type CertificateGroups = BTreeMap<CertIdentity, Vec<String>>;

impl<S: ObjectStore, R: CommandRunner> Engine<S, R> {
    /// Reconcile the local certificate directory into the bucket.
    ///
    /// With `dry_run`, hashes are compared and reported but no hook runs, no
    /// key is created and nothing is uploaded.
    pub async fn push(&self, dry_run: bool) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::new(SyncMode::Push, dry_run);

        if !dry_run {
            self.run_issue_commands().await;
        }

        let existing = manifest::fetch(&self.store, &self.prefix).await;
        let groups = collect_certificates(&self.cert_dir)?;
        if groups.is_empty() {
            tracing::info!("no certificate files in {}", self.cert_dir.display());
        }

        let mut fresh = Manifest::new();
        for (identity, files) in &groups {
            // A key failure for any identity aborts the whole push.
            let key = if dry_run {
                None
            } else {
                Some(self.keys.get_or_create(identity)?.0)
            };

            for file_name in files {
                let path = self.cert_dir.join(file_name);
                let data = match std::fs::read(&path) {
                    Ok(data) => data,
                    Err(err) => {
                        tracing::warn!("failed to read {}: {err}", path.display());
                        continue;
                    }
                };

                let object = encrypted_name(file_name);
                let hash = digest(&data);
                let unchanged = existing.get(&object) == Some(&hash);
                fresh.insert(object.clone(), hash);

                if unchanged {
                    tracing::debug!("unchanged: {object}");
                    report.transfers.push(Transfer::Unchanged { object });
                    continue;
                }

                let Some(key) = key.as_ref() else {
                    tracing::info!("[dry-run] would upload: {object}");
                    report.transfers.push(Transfer::WouldTransfer { object });
                    continue;
                };

                let sealed = cipher::seal(&data, key).map_err(|source| SyncError::Cipher {
                    action: "encrypt",
                    name: file_name.clone(),
                    source,
                })?;
                let remote = object_key(&self.prefix, &object);
                self.store.put(&remote, sealed).await?;
                tracing::info!("uploaded {remote}");
                report.transfers.push(Transfer::Transferred { object });
            }
        }

        if report.changed() {
            // Objects are already uploaded at this point; a failed publish is
            // logged and the next run re-uploads.
            match manifest::publish(&self.store, &self.prefix, &fresh).await {
                Ok(()) => report.manifest_published = true,
                Err(err) => tracing::warn!("failed to publish manifest: {err}"),
            }
        }

        if !dry_run {
            self.reload().await?;
        }

        Ok(report)
    }

    async fn run_issue_commands(&self) {
        let total = self.issue_commands.len();
        for (i, issue) in self.issue_commands.iter().enumerate() {
            if let Err(err) = self.runner.run(&issue.command, &issue.env).await {
                tracing::warn!("issue command {}/{total} failed: {err}", i + 1);
            }
        }
    }
}

/// Scan `cert_dir` (non-recursively) for certificate artifacts.
pub(crate) fn collect_certificates(cert_dir: &Path) -> Result<CertificateGroups, SyncError> {
    let entries = std::fs::read_dir(cert_dir).map_err(|e| io_err(cert_dir, e))?;

    let mut groups = CertificateGroups::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(cert_dir, e))?;
        let ty = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
        if ty.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let Some(identity) = CertIdentity::resolve(&name) else {
            continue;
        };
        groups.entry(identity).or_default().push(name);
    }

    for files in groups.values_mut() {
        files.sort();
    }
    Ok(groups)
}
