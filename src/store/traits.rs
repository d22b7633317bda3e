//! Object store trait definition.

use crate::core::error::StoreError;
use crate::core::{ByteStream, Metadata, StoredObject};
use crate::credentials::Credentials;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt::Debug;

/// Trait for the bucket being scanned.
///
/// Implementations must be thread-safe. The orchestrator treats the
/// listing as a forward-only sequence; pagination is the store's concern.
#[async_trait]
pub trait ObjectStore: Send + Sync + Debug {
    /// Returns a short name for logs, like the bucket name.
    fn name(&self) -> &str;

    /// Enumerates every object in the bucket.
    fn list_objects(&self) -> BoxStream<'_, Result<StoredObject, StoreError>>;

    /// Fetches the current metadata of one object.
    async fn stat_object(&self, key: &str) -> Result<Metadata, StoreError>;

    /// Opens the body of one object.
    ///
    /// `Ok(None)` means the store has no body for the key, for example
    /// because the object was deleted after it was listed.
    async fn get_object(&self, key: &str) -> Result<Option<ByteStream>, StoreError>;

    /// Merges `metadata` into the object's stored metadata.
    async fn put_metadata(&self, _key: &str, _metadata: Metadata) -> Result<(), StoreError> {
        Err(StoreError::Unsupported {
            operation: "put_metadata",
        })
    }

    /// Hands freshly refreshed credentials to the store's client.
    ///
    /// Stores that need no credentials ignore this.
    fn apply_credentials(&self, _credentials: &Credentials) {}
}

/// An arc-wrapped store for shared ownership.
pub type ArcObjectStore = std::sync::Arc<dyn ObjectStore>;
