//! # certsync-engine
//!
//! Encrypted, manifest-gated synchronisation of certificate files between a
//! local directory and an object-storage bucket.
//!
//! Call [`pipeline::run`] to connect to the configured bucket and execute one
//! push or pull, or drive an [`Engine`] directly with any [`ObjectStore`] and
//! [`CommandRunner`].

pub mod cipher;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod manifest;
pub mod pipeline;
mod pull;
mod push;
pub mod storage;

pub use engine::{Engine, SyncMode, SyncReport, Transfer};
pub use error::{CipherError, SyncError};
pub use hooks::{CommandRunner, ShellRunner};
pub use manifest::Manifest;
pub use storage::{MemoryStore, ObjectStore, S3Store};
