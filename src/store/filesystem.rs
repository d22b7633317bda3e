//! Filesystem-backed object store.
//!
//! Treats a directory tree as a bucket: every directory is listed as a
//! `prefix/` placeholder and every other entry is an object keyed by its
//! `/`-separated path relative to the root. Object metadata lives in one
//! JSON index at the root.
//!
//! # Keys
//!
//! Keys are lossless. `%` and any byte of a name that is not valid UTF-8
//! are written as `%XX`, so `ev\xffil.com` is listed as `ev%FFil.com` and
//! `100%.txt` as `100%25.txt`. Only the canonical escaped form resolves.
//!
//! Symlinks and special files are listed without being followed into. An
//! entry that cannot be read as a regular file fails when fetched, so it is
//! reported as an error rather than left out of the listing.
//!
//! # Directory Structure
//!
//! ```text
//! bucket/
//! ├── .bucketscan-metadata.json   # { "<key>": { "<tag>": "<value>" } }
//! ├── reports/                    # listed as "reports/"
//! │   └── q1.pdf                  # listed as "reports/q1.pdf"
//! └── readme.txt
//! ```

use crate::core::error::StoreError;
use crate::core::{ByteStream, Metadata, StoredObject, PATH_SEPARATOR};
use crate::store::traits::ObjectStore;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Name of the metadata index file at the bucket root.
pub const METADATA_INDEX: &str = ".bucketscan-metadata.json";

const ESCAPE: char = '%';

type MetadataIndex = BTreeMap<String, Metadata>;

/// A bucket rooted at a local directory.
///
/// Index writes within one store are serialized. Two processes updating
/// the same bucket can still lose each other's updates, since the last
/// rename wins, so a single writer per bucket is assumed.
#[derive(Debug)]
pub struct LocalFsObjectStore {
    /// Bucket root.
    root: PathBuf,
    /// Name used in logs.
    name: String,
    /// Serializes read-modify-write cycles on the index.
    index_lock: Mutex<()>,
}

impl LocalFsObjectStore {
    /// Opens the bucket rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("bucket root {} is not a directory", root.display()),
            )));
        }

        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("bucket")
            .to_string();

        Ok(Self {
            root,
            name,
            index_lock: Mutex::new(()),
        })
    }

    /// Returns the bucket root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(METADATA_INDEX)
    }

    /// Maps a key to a path under the root, refusing keys that escape it.
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let not_found = || StoreError::NotFound {
            key: key.to_string(),
        };
        if key.is_empty() || is_reserved(key) {
            return Err(not_found());
        }

        let mut path = self.root.clone();
        for segment in key.split(PATH_SEPARATOR) {
            let name = decode_component(segment).ok_or_else(not_found)?;
            let mut components = Path::new(&name).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(part)), None) if part == name.as_os_str() => {
                    path.push(part)
                }
                _ => return Err(not_found()),
            }
        }
        Ok(path)
    }

    /// Reads the metadata index. A missing index is empty.
    async fn read_index(&self) -> Result<MetadataIndex, StoreError> {
        let content = match tokio::fs::read_to_string(self.index_path()).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(MetadataIndex::new()),
            Err(e) => {
                return Err(StoreError::Metadata {
                    key: METADATA_INDEX.to_string(),
                    reason: format!("failed to read index: {}", e),
                })
            }
        };

        serde_json::from_str(&content).map_err(|e| StoreError::Metadata {
            key: METADATA_INDEX.to_string(),
            reason: format!("malformed index: {}", e),
        })
    }

    /// Loads the metadata index for reading.
    ///
    /// An unreadable index is logged and treated as empty, so affected
    /// objects look never-scanned and get scanned. Writers use
    /// [`read_index`](Self::read_index) instead and leave the file alone.
    async fn load_index(&self) -> MetadataIndex {
        self.read_index().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, bucket = %self.name, "Ignoring unreadable metadata index");
            MetadataIndex::new()
        })
    }

    async fn save_index(&self, index: &MetadataIndex) -> Result<(), StoreError> {
        let content =
            serde_json::to_string_pretty(index).map_err(|e| StoreError::Metadata {
                key: METADATA_INDEX.to_string(),
                reason: format!("failed to serialize index: {}", e),
            })?;

        let tmp = self
            .root
            .join(format!("{}.{}.tmp", METADATA_INDEX, Uuid::new_v4()));
        let written = match tokio::fs::write(&tmp, content).await {
            Ok(()) => tokio::fs::rename(&tmp, self.index_path()).await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                tracing::debug!(
                    error = %cleanup,
                    path = %tmp.display(),
                    "Failed to remove temporary index"
                );
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Walks the tree and returns every object in key order.
    async fn walk(&self) -> Result<Vec<StoredObject>, StoreError> {
        let index = self.load_index().await;
        let mut objects = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let key = self.key_for(&path)?;
                if is_reserved(&key) {
                    continue;
                }

                // `file_type` does not follow symlinks, so a link to a
                // directory is an object here and never walked into.
                if entry.file_type().await?.is_dir() {
                    objects.push(StoredObject::new(format!("{}{}", key, PATH_SEPARATOR), 0));
                    pending.push(path);
                    continue;
                }

                let size = match tokio::fs::metadata(&path).await {
                    Ok(meta) if meta.is_file() => meta.len(),
                    Ok(_) => {
                        tracing::warn!(
                            key = %key,
                            bucket = %self.name,
                            "Listing non-regular entry"
                        );
                        0
                    }
                    Err(e) => {
                        tracing::warn!(
                            key = %key,
                            error = %e,
                            bucket = %self.name,
                            "Listing entry that cannot be inspected"
                        );
                        0
                    }
                };
                let metadata = index.get(&key).cloned().unwrap_or_default();
                objects.push(StoredObject {
                    key,
                    size,
                    metadata,
                });
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn key_for(&self, path: &Path) -> Result<String, StoreError> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let mut key = String::new();
        for component in relative.components() {
            if !key.is_empty() {
                key.push(PATH_SEPARATOR);
            }
            let name = encode_component(component.as_os_str()).ok_or_else(|| {
                StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("cannot represent {} as a key", relative.display()),
                ))
            })?;
            key.push_str(&name);
        }
        Ok(key)
    }
}

/// The index and its temporary files are never objects.
fn is_reserved(key: &str) -> bool {
    key == METADATA_INDEX
        || key
            .strip_prefix(METADATA_INDEX)
            .is_some_and(|rest| rest.starts_with('.'))
}

#[cfg(unix)]
fn encode_component(name: &OsStr) -> Option<String> {
    use std::os::unix::ffi::OsStrExt;
    Some(escape_name(name.as_bytes()))
}

#[cfg(not(unix))]
fn encode_component(name: &OsStr) -> Option<String> {
    name.to_str().map(|s| escape_name(s.as_bytes()))
}

#[cfg(unix)]
fn decode_component(segment: &str) -> Option<OsString> {
    use std::os::unix::ffi::OsStringExt;
    unescape_name(segment).map(OsString::from_vec)
}

#[cfg(not(unix))]
fn decode_component(segment: &str) -> Option<OsString> {
    unescape_name(segment)
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .map(OsString::from)
}

fn escape_name(bytes: &[u8]) -> String {
    let mut name = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        for c in chunk.valid().chars() {
            if c == ESCAPE {
                name.push_str("%25");
            } else {
                name.push(c);
            }
        }
        for byte in chunk.invalid() {
            let _ = write!(name, "%{:02X}", byte);
        }
    }
    name
}

/// Reverses [`escape_name`], accepting only its exact output.
fn unescape_name(segment: &str) -> Option<Vec<u8>> {
    let bytes = segment.as_bytes();
    let mut name = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == ESCAPE as u8 {
            let hex = bytes.get(i + 1..i + 3)?;
            if !hex.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            let hex = std::str::from_utf8(hex).ok()?;
            name.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            name.push(bytes[i]);
            i += 1;
        }
    }

    (escape_name(&name) == segment).then_some(name)
}

#[async_trait]
impl ObjectStore for LocalFsObjectStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_objects(&self) -> BoxStream<'_, Result<StoredObject, StoreError>> {
        stream::once(self.walk())
            .map_ok(|objects| stream::iter(objects.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }

    async fn stat_object(&self, key: &str) -> Result<Metadata, StoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(StoreError::NotFound { key: key.to_string() }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound { key: key.to_string() });
            }
            Err(e) => return Err(e.into()),
        }

        Ok(self.load_index().await.remove(key).unwrap_or_default())
    }

    async fn get_object(&self, key: &str) -> Result<Option<ByteStream>, StoreError> {
        let path = self.resolve(key)?;

        // Checked before opening so a FIFO never blocks the open.
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{} is not a regular file", key),
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_metadata(&self, key: &str, metadata: Metadata) -> Result<(), StoreError> {
        self.resolve(key)?;

        let _guard = self.index_lock.lock().await;
        let mut index = self.read_index().await?;
        index.entry(key.to_string()).or_default().extend(metadata);
        self.save_index(&index).await
    }
}
