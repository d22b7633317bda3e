//! Scan eligibility filtering.
//!
//! Decides which listed objects are scanned this run. Predicates are
//! pluggable through [`EligibilityPredicate`]; [`select`] applies one to a
//! listing and collects the candidate keys with aggregate counts.

mod filter;
mod predicate;

pub use filter::{select, Selection};
pub use predicate::{
    parse_scan_timestamp, Composite, Eligibility, EligibilityPredicate, SizeLimit, Staleness,
    DEFAULT_MAX_FILE_SIZE, DEFAULT_RESCAN_AFTER,
};
