//! Credential types and providers.

use crate::core::error::CredentialError;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::fmt::Debug;

/// Time-limited object store credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Access key id (not secret).
    pub access_key_id: String,

    /// Secret access key (kept secret).
    pub secret_access_key: SecretString,

    /// Session token for temporary credentials (kept secret).
    pub session_token: Option<SecretString>,

    /// When the credentials stop working. `None` never expires.
    pub expiration: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Creates long-lived credentials.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::new(secret_access_key.into().into()),
            session_token: None,
            expiration: None,
        }
    }

    /// Sets the session token.
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(SecretString::new(token.into().into()));
        self
    }

    /// Sets the expiration.
    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Returns `true` if the credentials are expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|exp| exp <= now)
    }

    /// Returns `true` if a secret key is present.
    pub fn has_secret(&self) -> bool {
        !self.secret_access_key.expose_secret().is_empty()
    }
}

/// Source of fresh credentials, such as a token exchange with an identity
/// provider.
#[async_trait]
pub trait CredentialProvider: Send + Sync + Debug {
    /// Fetches a new set of credentials.
    async fn fetch(&self) -> Result<Credentials, CredentialError>;
}

/// Hands out the same credentials every time.
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credentials: Credentials,
}

impl StaticCredentialProvider {
    /// Creates a provider for fixed credentials.
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn fetch(&self) -> Result<Credentials, CredentialError> {
        Ok(self.credentials.clone())
    }
}

/// Reads credentials from the standard `AWS_*` environment variables.
///
/// `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY` are required;
/// `AWS_SESSION_TOKEN` and `AWS_CREDENTIAL_EXPIRATION` (RFC 3339) are
/// optional.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialProvider {
    overrides: Option<std::collections::HashMap<String, String>>,
}

impl EnvCredentialProvider {
    /// Creates a provider reading the process environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider reading from a fixed map instead of the process
    /// environment.
    pub fn from_map(vars: std::collections::HashMap<String, String>) -> Self {
        Self {
            overrides: Some(vars),
        }
    }

    /// Returns `true` if the required variables are set.
    pub fn is_configured(&self) -> bool {
        self.var("AWS_ACCESS_KEY_ID").is_some() && self.var("AWS_SECRET_ACCESS_KEY").is_some()
    }

    fn var(&self, name: &str) -> Option<String> {
        let value = match &self.overrides {
            Some(vars) => vars.get(name).cloned(),
            None => std::env::var(name).ok(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &str) -> Result<String, CredentialError> {
        self.var(name).ok_or_else(|| CredentialError::Missing {
            what: name.to_string(),
        })
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn fetch(&self) -> Result<Credentials, CredentialError> {
        let mut credentials = Credentials::new(
            self.required("AWS_ACCESS_KEY_ID")?,
            self.required("AWS_SECRET_ACCESS_KEY")?,
        );

        if let Some(token) = self.var("AWS_SESSION_TOKEN") {
            credentials = credentials.with_session_token(token);
        }

        if let Some(raw) = self.var("AWS_CREDENTIAL_EXPIRATION") {
            let expiration = DateTime::parse_from_rfc3339(raw.trim()).map_err(|e| {
                CredentialError::Malformed {
                    reason: format!("AWS_CREDENTIAL_EXPIRATION {:?}: {}", raw, e),
                }
            })?;
            credentials = credentials.with_expiration(expiration.with_timezone(&Utc));
        }

        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_env_provider_reads_all_fields() {
        let provider = EnvCredentialProvider::from_map(vars(&[
            ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_SESSION_TOKEN", "token"),
            ("AWS_CREDENTIAL_EXPIRATION", "2030-01-01T00:00:00Z"),
        ]));
        assert!(provider.is_configured());

        let credentials = provider.fetch().await.unwrap();
        assert_eq!(credentials.access_key_id, "AKIDEXAMPLE");
        assert!(credentials.has_secret());
        assert_eq!(
            credentials.session_token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("token".to_string())
        );
        assert_eq!(
            credentials.expiration.unwrap().to_rfc3339(),
            "2030-01-01T00:00:00+00:00"
        );
    }

    #[tokio::test]
    async fn test_env_provider_missing_secret() {
        let provider = EnvCredentialProvider::from_map(vars(&[("AWS_ACCESS_KEY_ID", "AKID")]));
        assert!(!provider.is_configured());
        assert!(matches!(
            provider.fetch().await,
            Err(CredentialError::Missing { ref what }) if what == "AWS_SECRET_ACCESS_KEY"
        ));
    }

    #[tokio::test]
    async fn test_env_provider_bad_expiration() {
        let provider = EnvCredentialProvider::from_map(vars(&[
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_CREDENTIAL_EXPIRATION", "tomorrow-ish"),
        ]));
        assert!(matches!(
            provider.fetch().await,
            Err(CredentialError::Malformed { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credentials = Credentials::new("AKID", "super-secret").with_session_token("tok");
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("AKID"));
        assert!(!debug.contains("super-secret"));
    }
}
