//! Error types for certsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the per-certificate key store.
#[derive(Debug, Error)]
pub enum KeyError {
    /// No key file exists for the identity.
    #[error("key not found at {path}")]
    NotFound { path: PathBuf },

    /// The key file exists but does not decode to exactly 32 bytes.
    #[error("invalid key format in {path}: {reason}")]
    InvalidKeyFormat { path: PathBuf, reason: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parse error, with the file path for context.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub(crate) fn key_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> KeyError {
    KeyError::Io {
        path: path.into(),
        source,
    }
}
