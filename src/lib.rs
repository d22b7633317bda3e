//! # Bucketscan
//!
//! Scans the objects of an S3-compatible bucket for malware by streaming
//! each one to a ClamAV daemon over the INSTREAM protocol.
//!
//! ## Overview
//!
//! A run goes through four stages:
//!
//! - List the bucket and filter it down to the eligible objects (size limit,
//!   staleness of the last clean verdict, or both)
//! - Stream every candidate to the scanner, retrying failed attempts with
//!   exponential backoff
//! - Fold verdicts and failures into a `RunSummary`, optionally tagging each
//!   object with its verdict
//! - Evaluate a `FailurePolicy` over the summary to decide the exit status
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bucketscan::backends::ClamAvScanner;
//! use bucketscan::eligibility::Staleness;
//! use bucketscan::store::LocalFsObjectStore;
//! use bucketscan::{FailurePolicy, ScanOrchestrator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut orchestrator = ScanOrchestrator::builder()
//!         .with_store(Arc::new(LocalFsObjectStore::new("/srv/bucket")?))
//!         .with_scanner(Arc::new(ClamAvScanner::with_defaults()?))
//!         .with_predicate(Staleness::default())
//!         .build()?;
//!
//!     let summary = orchestrator.run().await?;
//!     let decision = FailurePolicy::default().evaluate(&summary);
//!     println!("infected: {}, passed: {}", summary.counts.infected, decision.passed);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `default` - Includes the ClamAV backend
//! - `clamav` - ClamAV backend and the `bucketscan` binary
//!
//! ## Architecture
//!
//! - **Core**: Fundamental types, traits, and error handling
//! - **Backends**: Scanner implementations
//! - **Store**: The object store seam and its local implementations
//! - **Credentials**: Expiring credentials and their refresh cache
//! - **Eligibility**: Which objects get scanned
//! - **Manager**: The per-object retry loop and the run summary
//! - **Policy**: Pass/fail decision over a finished run
//! - **Audit**: Structured events for every run milestone

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod backends;
pub mod config;
pub mod core;
pub mod credentials;
pub mod eligibility;
pub mod manager;
pub mod policy;
pub mod store;

// Re-export commonly used types at the crate root
pub use crate::core::{
    RunSummary, ScanError, ScanOutcome, ScanVerdict, Scanner, StoredObject, SummaryCounts,
};

pub use crate::config::{ConfigError, Settings};
pub use crate::eligibility::{Eligibility, EligibilityPredicate};
pub use crate::manager::{OrchestratorConfig, RetryConfig, ScanOrchestrator};
pub use crate::policy::{FailurePolicy, PolicyDecision};
pub use crate::store::ObjectStore;

/// Prelude module for convenient imports.
///
/// ```rust
/// use bucketscan::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{
        RunSummary, ScanError, ScanOutcome, ScanVerdict, Scanner, StoredObject, SummaryCounts,
    };
    pub use crate::credentials::{CredentialCache, CredentialProvider, Credentials};
    pub use crate::eligibility::{
        Composite, Eligibility, EligibilityPredicate, SizeLimit, Staleness,
    };
    pub use crate::manager::{OrchestratorConfig, RetryConfig, ScanOrchestrator};
    pub use crate::policy::{FailurePolicy, PolicyDecision};
    pub use crate::store::{InMemoryObjectStore, LocalFsObjectStore, ObjectStore};
}
