//! Manifest — SHA-256 change-detection ledger for encrypted objects.
//!
//! One JSON object per (bucket, prefix), stored at `<prefix>/.hashes.json`,
//! mapping encrypted-object basenames to the hex digest of the *plaintext*:
//!
//! ```json
//! {"a.com.crt.enc":"9f86d0…","a.com.key.enc":"2c26b4…"}
//! ```
//!
//! Only push writes the manifest, and only after a run that uploaded
//! something. Fetch never fails: a missing or unreadable manifest is the
//! same as an empty one. That keeps a corrupt manifest from blocking every
//! future sync, at the cost of a full re-upload (push) or re-download (pull).
//! Concurrent pushers to the same prefix are not coordinated; the last
//! manifest written wins.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::error::SyncError;
use crate::storage::{object_key, ObjectStore};

/// Basename of the manifest object.
pub const MANIFEST_NAME: &str = ".hashes.json";

/// Suffix appended to a plaintext filename to name its encrypted object.
pub const ENCRYPTED_SUFFIX: &str = ".enc";

/// Encrypted-object name → lowercase hex SHA-256 of the plaintext.
///
/// Ordered so that publishing the same content twice produces identical
/// bytes.
pub type Manifest = BTreeMap<String, String>;

/// `a.com.crt` → `a.com.crt.enc`.
pub fn encrypted_name(file_name: &str) -> String {
    format!("{file_name}{ENCRYPTED_SUFFIX}")
}

/// Lowercase hex SHA-256 of `data`.
pub fn digest(data: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(data);
    hex::encode(h.finalize())
}

/// Fetch the manifest for `prefix`.
///
/// Any retrieval or parse failure yields an empty manifest.
pub async fn fetch<S: ObjectStore + ?Sized>(store: &S, prefix: &str) -> Manifest {
    let key = object_key(prefix, MANIFEST_NAME);
    let body = match store.get(&key).await {
        Ok(body) => body,
        Err(err) => {
            tracing::debug!("no manifest at {key} ({err}); treating as empty");
            return Manifest::new();
        }
    };
    match serde_json::from_slice::<Manifest>(&body) {
        Ok(manifest) => manifest,
        Err(err) => {
            tracing::warn!("ignoring unreadable manifest {key}: {err}");
            Manifest::new()
        }
    }
}

/// Serialize `manifest` (with a trailing newline) and overwrite the manifest
/// object for `prefix`.
pub async fn publish<S: ObjectStore + ?Sized>(
    store: &S,
    prefix: &str,
    manifest: &Manifest,
) -> Result<(), SyncError> {
    let mut body = serde_json::to_vec(manifest)?;
    body.push(b'\n');
    let key = object_key(prefix, MANIFEST_NAME);
    store.put(&key, body).await?;
    tracing::debug!("published manifest {key} ({} entries)", manifest.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn digest_is_lowercase_hex_sha256() {
        assert_eq!(
            digest(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn encrypted_name_appends_suffix() {
        assert_eq!(encrypted_name("a.com.key"), "a.com.key.enc");
    }

    #[tokio::test]
    async fn fetch_missing_manifest_is_empty() {
        let store = MemoryStore::new();
        assert!(fetch(&store, "prod").await.is_empty());
    }

    #[tokio::test]
    async fn fetch_corrupt_manifest_is_empty() {
        let store = MemoryStore::new();
        store.insert("prod/.hashes.json", b"{not json".to_vec());
        assert!(fetch(&store, "prod").await.is_empty());

        store.insert("prod/.hashes.json", b"[\"a\",\"b\"]".to_vec());
        assert!(fetch(&store, "prod").await.is_empty());
    }

    #[tokio::test]
    async fn publish_then_fetch_roundtrip() {
        let store = MemoryStore::new();
        let mut manifest = Manifest::new();
        manifest.insert("a.com.crt.enc".to_string(), digest(b"crt"));
        manifest.insert("a.com.key.enc".to_string(), digest(b"key"));

        publish(&store, "", &manifest).await.unwrap();
        assert_eq!(fetch(&store, "").await, manifest);
    }

    #[tokio::test]
    async fn published_manifest_is_flat_json_with_trailing_newline() {
        let store = MemoryStore::new();
        let mut manifest = Manifest::new();
        manifest.insert("b.enc".to_string(), "02".to_string());
        manifest.insert("a.enc".to_string(), "01".to_string());

        publish(&store, "prod", &manifest).await.unwrap();
        let raw = store.object("prod/.hashes.json").expect("manifest object");
        assert_eq!(raw, b"{\"a.enc\":\"01\",\"b.enc\":\"02\"}\n");
    }

    #[tokio::test]
    async fn fetch_accepts_manifest_without_trailing_newline() {
        let store = MemoryStore::new();
        store.insert(".hashes.json", br#"{"x.crt.enc":"abc"}"#.to_vec());
        let manifest = fetch(&store, "").await;
        assert_eq!(manifest.get("x.crt.enc").map(String::as_str), Some("abc"));
    }
}
