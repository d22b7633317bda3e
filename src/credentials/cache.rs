//! Expiration-aware credential cache.

use crate::core::error::CredentialError;
use crate::credentials::provider::{CredentialProvider, Credentials};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// How long before expiry credentials are refreshed.
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(5 * 60);

/// Holds the current credentials and refreshes them before they expire.
#[derive(Debug)]
pub struct CredentialCache {
    provider: Arc<dyn CredentialProvider>,
    refresh_buffer: Duration,
    current: Option<Credentials>,
}

impl CredentialCache {
    /// Creates an empty cache in front of `provider`.
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        Self {
            provider,
            refresh_buffer: DEFAULT_REFRESH_BUFFER,
            current: None,
        }
    }

    /// Sets how long before expiry credentials are refreshed.
    pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = buffer;
        self
    }

    /// Returns the cached credentials without refreshing.
    pub fn current(&self) -> Option<&Credentials> {
        self.current.as_ref()
    }

    /// Returns `true` if the cache must ask the provider before the
    /// credentials can be used at `now`.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        let Some(credentials) = &self.current else {
            return true;
        };
        let Some(expiration) = credentials.expiration else {
            return false;
        };
        let buffer = chrono::Duration::from_std(self.refresh_buffer)
            .unwrap_or_else(|_| chrono::Duration::zero());
        now + buffer >= expiration
    }

    /// Refreshes the credentials if needed.
    ///
    /// Returns the new credentials when a refresh happened, `None` when the
    /// cached ones are still good.
    pub async fn refresh_if_needed(&mut self) -> Result<Option<&Credentials>, CredentialError> {
        let now = Utc::now();
        if !self.needs_refresh(now) {
            return Ok(None);
        }

        let credentials = self.provider.fetch().await?;
        if let Some(expiration) = credentials.expiration {
            if credentials.is_expired_at(now) {
                return Err(CredentialError::Expired { expiration });
            }
        }

        tracing::debug!(
            access_key_id = %credentials.access_key_id,
            expiration = ?credentials.expiration,
            "Refreshed object store credentials"
        );

        self.current = Some(credentials);
        Ok(self.current.as_ref())
    }
}
