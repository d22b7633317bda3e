//! Error types for the bucketscan library.
//!
//! Per-object failures (`ScanError` variants raised while fetching or
//! scanning one object) are contained by the orchestrator. Credential,
//! configuration and listing failures abort the whole run.

use std::time::Duration;
use thiserror::Error;

/// The main error type for scan operations.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Connecting to, writing to, or reading from the scanning daemon failed.
    #[error("transport error talking to scanning daemon: {0}")]
    Transport(#[source] std::io::Error),

    /// Reading the object's byte stream failed mid-transfer.
    #[error("failed to read source stream: {0}")]
    SourceRead(#[source] std::io::Error),

    /// The daemon answered, but with text that is neither a clean nor an
    /// infected verdict.
    #[error("unexpected response from scanning daemon: {text:?}")]
    Protocol {
        /// Response text after NUL stripping and trimming.
        text: String,
        /// Raw response bytes as received.
        raw: Vec<u8>,
    },

    /// The attempt exceeded its configured deadline.
    #[error("scan timed out after {elapsed:?}")]
    Timeout {
        /// How long the attempt ran before it was abandoned.
        elapsed: Duration,
    },

    /// The store returned no body for the object.
    #[error("object '{key}' returned no byte stream")]
    StreamUnavailable {
        /// Key of the object.
        key: String,
    },

    /// The object store failed.
    #[error("object store error: {0}")]
    Store(#[from] StoreError),

    /// Credentials could not be obtained or refreshed.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl ScanError {
    /// Returns `true` if the orchestrator should retry the object after
    /// this error.
    ///
    /// Every per-object failure is retried the same way, protocol errors
    /// included; only run-level failures are not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Configuration { .. })
    }

    /// Returns a stable short name for the error kind, used in logs and
    /// serialized summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::SourceRead(_) => "source_read",
            Self::Protocol { .. } => "protocol",
            Self::Timeout { .. } => "timeout",
            Self::StreamUnavailable { .. } => "stream_unavailable",
            Self::Store(_) => "store",
            Self::Credential(_) => "credential",
            Self::Configuration { .. } => "configuration",
        }
    }

    /// Creates a `Protocol` error from the raw response bytes.
    pub fn protocol(text: impl Into<String>, raw: impl Into<Vec<u8>>) -> Self {
        Self::Protocol {
            text: text.into(),
            raw: raw.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Error type for object store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No object exists under the key.
    #[error("object not found: {key}")]
    NotFound {
        /// The missing key.
        key: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored metadata could not be read or written.
    #[error("metadata error for '{key}': {reason}")]
    Metadata {
        /// Key of the object.
        key: String,
        /// What went wrong.
        reason: String,
    },

    /// The store does not support this operation.
    #[error("operation not supported: {operation}")]
    Unsupported {
        /// Name of the operation.
        operation: &'static str,
    },
}

/// Error type for credential acquisition.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Required credential configuration is absent.
    #[error("missing credential configuration: {what}")]
    Missing {
        /// What is missing.
        what: String,
    },

    /// The identity provider refused the exchange.
    #[error("identity provider rejected the request: {reason}")]
    Rejected {
        /// Reason given by the provider.
        reason: String,
    },

    /// The provider's response could not be understood.
    #[error("malformed credential response: {reason}")]
    Malformed {
        /// What could not be parsed.
        reason: String,
    },

    /// The provider handed out credentials that are already expired.
    #[error("credentials expired at {expiration}")]
    Expired {
        /// Reported expiration.
        expiration: chrono::DateTime<chrono::Utc>,
    },
}
