//! Credentials for the object store.
//!
//! Credential acquisition sits behind [`CredentialProvider`]. The
//! [`CredentialCache`] keeps the last credentials and asks the provider for
//! new ones shortly before they expire.

mod cache;
mod provider;

pub use cache::{CredentialCache, DEFAULT_REFRESH_BUFFER};
pub use provider::{
    CredentialProvider, Credentials, EnvCredentialProvider, StaticCredentialProvider,
};
