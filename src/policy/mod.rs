//! Failure policy for finished runs.
//!
//! Maps a run summary to a pass/fail decision under three independent
//! toggles, one per counter.

mod failure;

pub use failure::{FailurePolicy, FailureReason, PolicyDecision};
