//! Core types and traits for the bucketscan library.
//!
//! - [`types`] - Stored objects, verdicts and metadata tags
//! - [`traits`] - The `Scanner` trait
//! - [`error`] - Structured error types
//! - [`input`] - Byte stream abstraction for object bodies
//! - [`result`] - Per-object outcomes and the run summary

pub mod error;
pub mod input;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{CredentialError, ScanError, StoreError};
pub use input::{byte_stream_from_bytes, ByteStream, ChunkedReader};
pub use result::{FailureCause, RunSummary, ScanOutcome, ScanRecord, SummaryCounts};
pub use traits::{ArcScanner, Scanner};
pub use types::{
    Metadata, ObjectStatus, ScanVerdict, StoredObject, PATH_SEPARATOR, SCAN_STATUS_KEY,
    SCAN_TIMESTAMP_KEY,
};
