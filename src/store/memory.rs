//! In-memory object store.
//!
//! Useful for tests and for embedding the scanner in front of data that is
//! already in memory. Failure hooks let tests simulate flaky fetches,
//! vanished bodies and failing stat calls.

use crate::core::error::StoreError;
use crate::core::{ByteStream, ChunkedReader, Metadata, StoredObject};
use crate::credentials::Credentials;
use crate::store::traits::ObjectStore;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    metadata: Metadata,
}

#[derive(Debug, Default)]
struct Faults {
    /// Remaining failing `get_object` calls per key.
    get_failures: HashMap<String, u32>,
    /// Keys whose body is missing.
    missing_bodies: Vec<String>,
    /// Whether `stat_object` fails.
    stat_fails: bool,
}

/// An object store held entirely in memory.
///
/// Objects are listed in key order, like an S3 listing.
#[derive(Debug)]
pub struct InMemoryObjectStore {
    name: String,
    objects: RwLock<BTreeMap<String, Entry>>,
    faults: RwLock<Faults>,
    chunk_size: usize,
    get_count: AtomicU64,
    access_key_id: RwLock<Option<String>>,
}

impl InMemoryObjectStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            name: "memory".to_string(),
            objects: RwLock::new(BTreeMap::new()),
            faults: RwLock::new(Faults::default()),
            chunk_size: 8 * 1024,
            get_count: AtomicU64::new(0),
            access_key_id: RwLock::new(None),
        }
    }

    /// Sets the store name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the size of the chunks object bodies are streamed in.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Adds an object and returns self for chaining.
    pub fn with_object(self, key: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(key, data, Metadata::new());
        self
    }

    /// Adds an object with metadata and returns self for chaining.
    pub fn with_object_metadata(
        self,
        key: impl Into<String>,
        data: impl Into<Vec<u8>>,
        metadata: Metadata,
    ) -> Self {
        self.insert(key, data, metadata);
        self
    }

    /// Adds or replaces an object.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>, metadata: Metadata) {
        self.objects
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(
                key.into(),
                Entry {
                    data: data.into(),
                    metadata,
                },
            );
    }

    /// Makes the next `times` fetches of `key` fail.
    pub fn fail_gets(&self, key: impl Into<String>, times: u32) {
        self.faults
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get_failures
            .insert(key.into(), times);
    }

    /// Makes every fetch of `key` return no body.
    pub fn drop_body(&self, key: impl Into<String>) {
        self.faults
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .missing_bodies
            .push(key.into());
    }

    /// Makes every `stat_object` call fail.
    pub fn fail_stats(&self) {
        self.faults
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .stat_fails = true;
    }

    /// Returns the number of `get_object` calls made.
    pub fn get_count(&self) -> u64 {
        self.get_count.load(Ordering::Relaxed)
    }

    /// Returns the metadata currently stored for `key`.
    pub fn metadata(&self, key: &str) -> Option<Metadata> {
        self.objects
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .map(|e| e.metadata.clone())
    }

    /// Returns the access key id of the last credentials applied.
    pub fn applied_access_key_id(&self) -> Option<String> {
        self.access_key_id
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn take_get_failure(&self, key: &str) -> bool {
        let mut faults = self
            .faults
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match faults.get_failures.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_objects(&self) -> BoxStream<'_, Result<StoredObject, StoreError>> {
        let snapshot: Vec<_> = self
            .objects
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(key, entry)| {
                Ok(StoredObject {
                    key: key.clone(),
                    size: entry.data.len() as u64,
                    metadata: entry.metadata.clone(),
                })
            })
            .collect();

        stream::iter(snapshot).boxed()
    }

    async fn stat_object(&self, key: &str) -> Result<Metadata, StoreError> {
        if self
            .faults
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .stat_fails
        {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated stat failure",
            )));
        }

        self.metadata(key)
            .ok_or_else(|| StoreError::NotFound { key: key.to_string() })
    }

    async fn get_object(&self, key: &str) -> Result<Option<ByteStream>, StoreError> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        if self.take_get_failure(key) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                format!("simulated fetch failure for {}", key),
            )));
        }

        let missing = self
            .faults
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .missing_bodies
            .iter()
            .any(|k| k == key);
        if missing {
            return Ok(None);
        }

        let data = self
            .objects
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .map(|e| e.data.clone());

        Ok(data.map(|data| Box::new(ChunkedReader::split(&data, self.chunk_size)) as ByteStream))
    }

    async fn put_metadata(&self, key: &str, metadata: Metadata) -> Result<(), StoreError> {
        let mut objects = self
            .objects
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = objects
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound { key: key.to_string() })?;
        entry.metadata.extend(metadata);
        Ok(())
    }

    fn apply_credentials(&self, credentials: &Credentials) {
        *self
            .access_key_id
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) =
            Some(credentials.access_key_id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_listing_is_key_ordered() {
        let store = InMemoryObjectStore::new()
            .with_object("b.txt", b"bb".to_vec())
            .with_object("a.txt", b"a".to_vec());

        let objects: Vec<_> = store.list_objects().try_collect().await.unwrap();
        let keys: Vec<_> = objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, ["a.txt", "b.txt"]);
        assert_eq!(objects[1].size, 2);
    }

    #[tokio::test]
    async fn test_get_failures_then_success() {
        let store = InMemoryObjectStore::new().with_object("k", b"body".to_vec());
        store.fail_gets("k", 1);

        assert!(store.get_object("k").await.is_err());

        let mut stream = store.get_object("k").await.unwrap().unwrap();
        let mut body = Vec::new();
        stream.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"body");
        assert_eq!(store.get_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_body_and_unknown_key() {
        let store = InMemoryObjectStore::new().with_object("gone", b"x".to_vec());
        store.drop_body("gone");

        assert!(store.get_object("gone").await.unwrap().is_none());
        assert!(store.get_object("never").await.unwrap().is_none());
        assert!(matches!(
            store.stat_object("never").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_put_metadata_merges() {
        let mut metadata = Metadata::new();
        metadata.insert("owner".into(), "ops".into());
        let store = InMemoryObjectStore::new().with_object_metadata("k", b"x".to_vec(), metadata);

        let mut tags = Metadata::new();
        tags.insert("scan-status".into(), "clean".into());
        store.put_metadata("k", tags).await.unwrap();

        let stored = store.stat_object("k").await.unwrap();
        assert_eq!(stored.get("owner").map(String::as_str), Some("ops"));
        assert_eq!(stored.get("scan-status").map(String::as_str), Some("clean"));
    }
}
