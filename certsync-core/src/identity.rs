//! Certificate identities.
//!
//! A certificate and its private key share one identity, derived purely from
//! the filename: `_.example.com.crt` and `_.example.com.key` both resolve to
//! `_.example.com`. Issuer chains (`*.issuer.crt`) are not artifacts.

use std::fmt;

use serde::{Deserialize, Serialize};

const CERT_SUFFIX: &str = ".crt";
const ISSUER_SUFFIX: &str = ".issuer.crt";
const KEY_SUFFIX: &str = ".key";

/// The logical name shared by a certificate and its private key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CertIdentity(pub String);

impl CertIdentity {
    /// Resolve `file_name` to its identity.
    ///
    /// Returns `None` for anything that is not a `.crt` (excluding
    /// `.issuer.crt`) or `.key` file; callers skip those.
    pub fn resolve(file_name: &str) -> Option<Self> {
        if file_name.ends_with(CERT_SUFFIX) && !file_name.ends_with(ISSUER_SUFFIX) {
            return file_name.strip_suffix(CERT_SUFFIX).map(Self::from);
        }
        file_name.strip_suffix(KEY_SUFFIX).map(Self::from)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CertIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CertIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CertIdentity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}
