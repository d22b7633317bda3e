//! Core traits for the bucketscan library.
//!
//! This module defines the `Scanner` trait that scanning backends
//! implement. The orchestrator only talks to scanners through it, so the
//! ClamAV client and the test mock are interchangeable.

use crate::core::error::ScanError;
use crate::core::input::ByteStream;
use crate::core::types::ScanVerdict;

use async_trait::async_trait;
use std::fmt::Debug;

/// The core trait for malware scanning engines.
///
/// # Implementation Notes
///
/// - One call to `scan` is one attempt. Implementations must not retry
///   internally; the orchestrator owns the retry policy.
/// - Errors raised while reading `stream` must be surfaced as
///   [`ScanError::SourceRead`] carrying the original `io::Error`.
/// - Implementations should never panic.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use bucketscan::core::{ByteStream, ScanError, ScanVerdict, Scanner};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct AlwaysClean;
///
/// #[async_trait]
/// impl Scanner for AlwaysClean {
///     fn name(&self) -> &str {
///         "always-clean"
///     }
///
///     async fn scan(&self, _stream: ByteStream) -> Result<ScanVerdict, ScanError> {
///         Ok(ScanVerdict::clean())
///     }
/// }
/// ```
#[async_trait]
pub trait Scanner: Send + Sync + Debug {
    /// Returns a stable name for this engine, like `"clamav"`.
    fn name(&self) -> &str;

    /// Streams one object body to the engine and returns its verdict.
    async fn scan(&self, stream: ByteStream) -> Result<ScanVerdict, ScanError>;

    /// Performs a lightweight reachability check.
    async fn health_check(&self) -> Result<(), ScanError> {
        Ok(())
    }

    /// Returns the engine's version string, if it reports one.
    async fn version(&self) -> Option<String> {
        None
    }
}

/// An arc-wrapped scanner for shared ownership.
pub type ArcScanner = std::sync::Arc<dyn Scanner>;
