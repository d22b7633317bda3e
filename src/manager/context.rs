//! Per-run context: the shared store and its credentials.

use crate::core::error::CredentialError;
use crate::credentials::CredentialCache;
use crate::store::ArcObjectStore;

/// What a run needs to reach the bucket.
#[derive(Debug)]
pub struct RunContext {
    store: ArcObjectStore,
    credentials: Option<CredentialCache>,
}

impl RunContext {
    /// Creates a context for a store that needs no credentials.
    pub fn new(store: ArcObjectStore) -> Self {
        Self {
            store,
            credentials: None,
        }
    }

    /// Attaches a credential cache.
    pub fn with_credentials(mut self, cache: CredentialCache) -> Self {
        self.credentials = Some(cache);
        self
    }

    /// Returns the store.
    pub fn store(&self) -> &ArcObjectStore {
        &self.store
    }

    /// Refreshes credentials if they are missing or about to expire, and
    /// hands new ones to the store.
    pub async fn refresh(&mut self) -> Result<(), CredentialError> {
        let Some(cache) = self.credentials.as_mut() else {
            return Ok(());
        };
        if let Some(credentials) = cache.refresh_if_needed().await? {
            self.store.apply_credentials(credentials);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credentials, StaticCredentialProvider};
    use crate::store::InMemoryObjectStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_refresh_applies_credentials_to_store() {
        let store = Arc::new(InMemoryObjectStore::new());
        let provider = StaticCredentialProvider::new(Credentials::new("AKIDRUN", "secret"));
        let cache = CredentialCache::new(Arc::new(provider));
        let mut context = RunContext::new(store.clone()).with_credentials(cache);

        context.refresh().await.unwrap();
        assert_eq!(store.applied_access_key_id().as_deref(), Some("AKIDRUN"));
    }

    #[tokio::test]
    async fn test_refresh_without_credentials_is_noop() {
        let store = Arc::new(InMemoryObjectStore::new());
        let mut context = RunContext::new(store.clone());

        context.refresh().await.unwrap();
        assert!(store.applied_access_key_id().is_none());
    }
}
