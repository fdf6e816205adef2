//! Pull — encrypted objects → local plaintext certificate files.
//!
//! Pull never creates keys and never writes the manifest. Objects whose
//! identity has no local key are skipped on every run until the key is
//! provisioned on this host.

use std::io::Write;
use std::path::{Path, PathBuf};

use certsync_core::{CertIdentity, KeyError};

use crate::cipher;
use crate::engine::{Engine, SyncMode, SyncReport, Transfer};
use crate::error::{io_err, SyncError};
use crate::hooks::CommandRunner;
use crate::manifest::{self, digest, ENCRYPTED_SUFFIX};
use crate::storage::{basename, list_prefix, ObjectStore};

impl<S: ObjectStore, R: CommandRunner> Engine<S, R> {
    /// Reconcile the bucket into the local certificate directory.
    ///
    /// With `dry_run`, objects that would be downloaded are reported but
    /// nothing is fetched, decrypted or written and no hook runs.
    pub async fn pull(&self, dry_run: bool) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::new(SyncMode::Pull, dry_run);
        let manifest = manifest::fetch(&self.store, &self.prefix).await;

        if self.keys.list()?.is_empty() {
            tracing::info!("no keys in {}; nothing to pull", self.keys.dir().display());
            return Ok(report);
        }

        let remote_keys = self.store.list(&list_prefix(&self.prefix)).await?;
        if remote_keys.is_empty() {
            tracing::info!("no remote objects under prefix '{}'", self.prefix);
            return Ok(report);
        }

        if !dry_run {
            std::fs::create_dir_all(&self.cert_dir).map_err(|e| io_err(&self.cert_dir, e))?;
        }

        for remote in &remote_keys {
            let object = basename(remote);
            let Some(file_name) = object.strip_suffix(ENCRYPTED_SUFFIX) else {
                continue;
            };
            let Some(identity) = CertIdentity::resolve(file_name) else {
                tracing::debug!("ignoring foreign object {remote}");
                continue;
            };

            let key = match self.keys.load(&identity) {
                Ok(key) => key,
                Err(KeyError::NotFound { .. }) => {
                    tracing::debug!("no key for {identity}; skipping {object}");
                    report.transfers.push(Transfer::SkippedNoKey {
                        object: object.to_string(),
                    });
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let path = self.cert_dir.join(file_name);
            if let Ok(local) = std::fs::read(&path) {
                if manifest.get(object) == Some(&digest(&local)) {
                    tracing::debug!("unchanged: {file_name}");
                    report.transfers.push(Transfer::Unchanged {
                        object: object.to_string(),
                    });
                    continue;
                }
            }

            if dry_run {
                tracing::info!("[dry-run] would download: {file_name}");
                report.transfers.push(Transfer::WouldTransfer {
                    object: object.to_string(),
                });
                continue;
            }

            let sealed = self.store.get(remote).await?;
            let plaintext = cipher::open(&sealed, &key).map_err(|source| SyncError::Cipher {
                action: "decrypt",
                name: remote.clone(),
                source,
            })?;
            write_private(&path, &plaintext)?;
            tracing::info!("downloaded {file_name}");
            report.transfers.push(Transfer::Transferred {
                object: object.to_string(),
            });
        }

        if !dry_run {
            self.reload().await?;
        }

        Ok(report)
    }
}

/// Atomically replace `path` with `contents`, readable by the owner only.
///
/// Writes `<path>.certsync.tmp` (mode `0600`) then renames it over `path`.
pub(crate) fn write_private(path: &Path, contents: &[u8]) -> Result<(), SyncError> {
    let tmp = PathBuf::from(format!("{}.certsync.tmp", path.display()));
    write_private_with_tmp(path, contents, &tmp)
}

fn write_private_with_tmp(path: &Path, contents: &[u8], tmp: &Path) -> Result<(), SyncError> {
    if let Err(e) = write_tmp(tmp, contents) {
        let _ = std::fs::remove_file(tmp);
        return Err(e);
    }
    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

fn write_tmp(tmp: &Path, contents: &[u8]) -> Result<(), SyncError> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(tmp).map_err(|e| io_err(tmp, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(|e| io_err(tmp, e))?;
    }
    file.write_all(contents).map_err(|e| io_err(tmp, e))?;
    file.sync_all().map_err(|e| io_err(tmp, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn write_private_replaces_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.com.crt");
        fs::write(&path, "old").unwrap();

        write_private(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert!(!tmp.path().join("a.com.crt.certsync.tmp").exists());
    }

    #[test]
    #[cfg(unix)]
    fn write_private_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.com.key");
        fs::write(&path, "old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        write_private(&path, b"secret").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    #[cfg(unix)]
    fn rename_failure_leaves_original_and_cleans_tmp() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let readonly_dir = root.path().join("readonly");
        fs::create_dir_all(&readonly_dir).unwrap();
        let path = readonly_dir.join("a.com.crt");
        fs::write(&path, "original").unwrap();
        fs::set_permissions(&readonly_dir, fs::Permissions::from_mode(0o555)).unwrap();

        let tmp_dir = TempDir::new().unwrap();
        let tmp_path = tmp_dir.path().join("a.com.crt.certsync.tmp");
        let result = write_private_with_tmp(&path, b"new", &tmp_path);

        fs::set_permissions(&readonly_dir, fs::Permissions::from_mode(0o755)).unwrap();
        // Running as root bypasses directory permissions; only check when it failed.
        if result.is_err() {
            assert_eq!(fs::read_to_string(&path).unwrap(), "original");
            assert!(!tmp_path.exists(), "tmp file should be cleaned up");
        }
    }
}
