//! Per-certificate key store.
//!
//! # Storage layout
//!
//! ```text
//! <key_dir>/                 (mode 0700, created on first save)
//!   <identity>.key           (base64 of 32 bytes + "\n", mode 0600)
//! ```
//!
//! Keys are created once on first push of an identity and never rotated.
//! A key file that exists but cannot be decoded is an error, never a cue to
//! regenerate: replacing it would orphan every object sealed under it.

use std::fmt;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{key_io_err, KeyError};
use crate::identity::CertIdentity;

/// Length of every per-certificate key in bytes.
pub const KEY_LEN: usize = 32;

const KEY_EXTENSION: &str = "key";

/// A 256-bit symmetric key. Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

/// Directory-backed key store.
#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<key_dir>/<identity>.key` — pure, no I/O.
    pub fn key_path(&self, identity: &CertIdentity) -> PathBuf {
        self.dir.join(format!("{}.{KEY_EXTENSION}", identity.0))
    }

    /// Load the key for `identity`.
    ///
    /// Returns [`KeyError::NotFound`] if no key file exists and
    /// [`KeyError::InvalidKeyFormat`] if it does not decode to 32 bytes.
    pub fn load(&self, identity: &CertIdentity) -> Result<EncryptionKey, KeyError> {
        let path = self.key_path(identity);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(KeyError::NotFound { path });
            }
            Err(err) => return Err(key_io_err(path, err)),
        };

        let mut decoded = BASE64
            .decode(contents.trim())
            .map_err(|e| KeyError::InvalidKeyFormat {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let bytes: Result<[u8; KEY_LEN], _> = decoded.as_slice().try_into();
        let len = decoded.len();
        decoded.zeroize();
        match bytes {
            Ok(bytes) => Ok(EncryptionKey(bytes)),
            Err(_) => Err(KeyError::InvalidKeyFormat {
                path,
                reason: format!("decoded to {len} bytes, expected {KEY_LEN}"),
            }),
        }
    }

    /// Generate a fresh key from the operating system CSPRNG.
    pub fn generate() -> EncryptionKey {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        let key = EncryptionKey(bytes);
        bytes.zeroize();
        key
    }

    /// Persist `key` for `identity`.
    ///
    /// Creates the key directory (mode `0700`) if absent and writes via
    /// `<path>.tmp` + rename so a crash never leaves a truncated key behind.
    pub fn save(&self, identity: &CertIdentity, key: &EncryptionKey) -> Result<(), KeyError> {
        create_private_dir(&self.dir)?;

        let path = self.key_path(identity);
        let tmp = path.with_extension(format!("{KEY_EXTENSION}.tmp"));
        let mut encoded = BASE64.encode(key.as_bytes());
        encoded.push('\n');

        let written = write_private_file(&tmp, encoded.as_bytes());
        encoded.zeroize();
        written?;

        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(key_io_err(path, e));
        }
        Ok(())
    }

    /// Load the key for `identity`, creating and saving a new one only when
    /// none exists. Returns the key and whether it was freshly created.
    ///
    /// Any failure other than [`KeyError::NotFound`] propagates unchanged.
    pub fn get_or_create(&self, identity: &CertIdentity) -> Result<(EncryptionKey, bool), KeyError> {
        match self.load(identity) {
            Ok(key) => Ok((key, false)),
            Err(KeyError::NotFound { .. }) => {
                let key = Self::generate();
                self.save(identity, &key)?;
                tracing::info!("generated new key for {identity}");
                Ok((key, true))
            }
            Err(err) => Err(err),
        }
    }

    /// Identities with a key file present, sorted. A missing key directory
    /// yields an empty list.
    pub fn list(&self) -> Result<Vec<CertIdentity>, KeyError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(key_io_err(&self.dir, err)),
        };

        let mut identities = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| key_io_err(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(KEY_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                identities.push(CertIdentity::from(stem));
            }
        }
        identities.sort();
        Ok(identities)
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> Result<(), KeyError> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .map_err(|e| key_io_err(dir, e))
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> Result<(), KeyError> {
    std::fs::create_dir_all(dir).map_err(|e| key_io_err(dir, e))
}

#[cfg(unix)]
fn write_private_file(path: &Path, contents: &[u8]) -> Result<(), KeyError> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| key_io_err(path, e))?;
    // A pre-existing tmp file keeps its old mode; force 0600 either way.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))
        .map_err(|e| key_io_err(path, e))?;
    file.write_all(contents).map_err(|e| key_io_err(path, e))?;
    file.sync_all().map_err(|e| key_io_err(path, e))
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, contents: &[u8]) -> Result<(), KeyError> {
    let mut file = std::fs::File::create(path).map_err(|e| key_io_err(path, e))?;
    file.write_all(contents).map_err(|e| key_io_err(path, e))?;
    file.sync_all().map_err(|e| key_io_err(path, e))
}
