//! Object storage capability.
//!
//! The engine only needs three operations over named blobs: get, put and
//! list. [`S3Store`] talks to AWS S3 or any S3-compatible service (MinIO,
//! Wasabi, Ceph RGW); [`MemoryStore`] keeps everything in process.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use certsync_core::S3Config;

use crate::error::{storage_err, SyncError};

/// Named-blob storage used by push and pull.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the full body of `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, SyncError>;

    /// Create or overwrite `key`.
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), SyncError>;

    /// Every key starting with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, SyncError>;
}

/// Full object key for `name` under `prefix`.
///
/// `object_key("prod", "a.crt.enc") == "prod/a.crt.enc"`; an empty prefix
/// yields the bare name.
pub fn object_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Listing prefix for a configured prefix: `prod` → `prod/`, empty → empty.
pub fn list_prefix(prefix: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        String::new()
    } else {
        format!("{prefix}/")
    }
}

/// Last path segment of an object key.
pub fn basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

// ---------------------------------------------------------------------------
// S3
// ---------------------------------------------------------------------------

/// S3-backed [`ObjectStore`] bound to one bucket.
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Build a client from `[s3]` configuration.
    ///
    /// Static credentials are used when either key is set; otherwise the
    /// default AWS credential chain applies.
    pub async fn connect(config: &S3Config) -> Result<Self, SyncError> {
        if config.bucket.trim().is_empty() {
            return Err(storage_err("connect", "", "bucket name is empty"));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if !config.region.is_empty() {
            loader = loader.region(Region::new(config.region.clone()));
        }
        if !config.access_key.is_empty() || !config.secret_key.is_empty() {
            loader = loader.credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                None,
                None,
                "certsync-config",
            ));
        }
        let sdk_config = loader.load().await;

        let mut builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.force_path_style);
        if !config.endpoint.is_empty() {
            tracing::debug!("using custom S3 endpoint: {}", config.endpoint);
            builder = builder.endpoint_url(&config.endpoint);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get(&self, key: &str) -> Result<Vec<u8>, SyncError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_err("get", key, DisplayErrorContext(e)))?;

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| storage_err("read", key, e))?;
        Ok(body.into_bytes().to_vec())
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), SyncError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| storage_err("put", key, DisplayErrorContext(e)))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, SyncError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);
            if !prefix.is_empty() {
                request = request.prefix(prefix);
            }
            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let resp = request
                .send()
                .await
                .map_err(|e| storage_err("list", prefix, DisplayErrorContext(e)))?;

            keys.extend(resp.contents().iter().filter_map(|obj| obj.key().map(str::to_string)));

            if resp.is_truncated() == Some(true) {
                continuation_token = resp.next_continuation_token().map(str::to_string);
                if continuation_token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        Ok(keys)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryInner {
    objects: BTreeMap<String, Vec<u8>>,
    puts: usize,
    gets: usize,
}

/// In-process [`ObjectStore`]. Clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an object without counting it as a `put`.
    pub fn insert(&self, key: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.lock().objects.insert(key.into(), body.into());
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    /// Number of `put` calls served so far.
    pub fn put_count(&self) -> usize {
        self.lock().puts
    }

    /// Number of successful `get` calls served so far.
    pub fn get_count(&self) -> usize {
        self.lock().gets
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, SyncError> {
        let mut inner = self.lock();
        let body = inner
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| storage_err("get", key, "no such key"))?;
        inner.gets += 1;
        Ok(body)
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), SyncError> {
        let mut inner = self.lock();
        inner.objects.insert(key.to_string(), body);
        inner.puts += 1;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, SyncError> {
        Ok(self
            .lock()
            .objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_with_and_without_prefix() {
        assert_eq!(object_key("", "a.com.crt.enc"), "a.com.crt.enc");
        assert_eq!(object_key("prod", "a.com.crt.enc"), "prod/a.com.crt.enc");
        assert_eq!(object_key("prod/", ".hashes.json"), "prod/.hashes.json");
        assert_eq!(object_key("a/b", "x"), "a/b/x");
    }

    #[test]
    fn list_prefix_adds_single_separator() {
        assert_eq!(list_prefix(""), "");
        assert_eq!(list_prefix("prod"), "prod/");
        assert_eq!(list_prefix("prod/"), "prod/");
    }

    #[test]
    fn basename_strips_directories() {
        assert_eq!(basename("prod/a.com.key.enc"), "a.com.key.enc");
        assert_eq!(basename("a.com.key.enc"), "a.com.key.enc");
        assert_eq!(basename("a/b/c"), "c");
    }

    #[tokio::test]
    async fn memory_store_put_get_list() {
        let store = MemoryStore::new();
        store.put("prod/a", b"1".to_vec()).await.unwrap();
        store.put("prod/b", b"2".to_vec()).await.unwrap();
        store.put("staging/c", b"3".to_vec()).await.unwrap();

        assert_eq!(store.get("prod/a").await.unwrap(), b"1");
        assert_eq!(store.list("prod/").await.unwrap(), vec!["prod/a", "prod/b"]);
        assert_eq!(store.list("").await.unwrap().len(), 3);
        assert_eq!(store.put_count(), 3);
        assert_eq!(store.get_count(), 1);
    }

    #[tokio::test]
    async fn memory_store_missing_key_is_storage_error() {
        let store = MemoryStore::new();
        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, SyncError::Storage { operation: "get", .. }), "got: {err}");
    }

    #[tokio::test]
    async fn clones_share_objects() {
        let store = MemoryStore::new();
        let clone = store.clone();
        clone.put("k", b"v".to_vec()).await.unwrap();
        assert_eq!(store.object("k"), Some(b"v".to_vec()));
    }
}
