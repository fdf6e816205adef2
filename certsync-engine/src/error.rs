//! Error types for certsync-engine.

use std::path::PathBuf;

use thiserror::Error;

use certsync_core::KeyError;

/// Failures of the seal/open primitive.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("ciphertext is truncated ({len} bytes)")]
    Truncated { len: usize },

    #[error("unsupported ciphertext format version {0}")]
    UnsupportedVersion(u8),

    /// Wrong key, or the ciphertext was modified.
    #[error("authentication failed")]
    Authentication,

    #[error("encryption failed")]
    Seal,
}

/// All errors that can abort a push or pull run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("key store error: {0}")]
    Key(#[from] KeyError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage {operation} failed for {key}: {message}")]
    Storage {
        operation: &'static str,
        key: String,
        message: String,
    },

    #[error("cannot {action} {name}: {source}")]
    Cipher {
        action: &'static str,
        name: String,
        #[source]
        source: CipherError,
    },

    #[error("command `{command}` failed: {reason}")]
    Hook { command: String, reason: String },

    /// JSON serialization error (manifest).
    #[error("manifest JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`SyncError::Storage`].
pub(crate) fn storage_err(
    operation: &'static str,
    key: impl Into<String>,
    message: impl ToString,
) -> SyncError {
    SyncError::Storage {
        operation,
        key: key.into(),
        message: message.to_string(),
    }
}
