//! Scanning backend implementations.
//!
//! This module contains implementations of the `Scanner` trait.
//!
//! ## Available Backends
//!
//! - [`mock`] - An in-process scanner for testing
//! - [`clamav`] - ClamAV via the clamd INSTREAM protocol (requires `clamav` feature)

pub mod mock;

#[cfg(feature = "clamav")]
pub mod clamav;

#[cfg(test)]
pub(crate) mod fake_clamd;

// Re-exports
pub use mock::{MockFailure, MockScanner, EICAR, EICAR_SIGNATURE};

#[cfg(feature = "clamav")]
pub use clamav::{ClamAvConfig, ClamAvEndpoint, ClamAvScanner};
