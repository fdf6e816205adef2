//! certsync core library — certificate identities, per-certificate key
//! store, configuration and errors.
//!
//! - [`identity`] — filename → [`CertIdentity`] resolution
//! - [`keystore`] — create-once, reuse-forever symmetric keys
//! - [`config`] — TOML configuration shared by push and pull
//! - [`error`] — [`KeyError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod identity;
pub mod keystore;

pub use config::{Config, DaemonConfig, IssueCommand, S3Config};
pub use error::{ConfigError, KeyError};
pub use identity::CertIdentity;
pub use keystore::{EncryptionKey, KeyStore, KEY_LEN};
