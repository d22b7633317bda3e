//! Eligibility predicates.

use crate::core::StoredObject;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

/// Default maximum object size that is scanned: 25 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 26_214_400;

/// Default age after which a clean verdict is stale: 7 days.
pub const DEFAULT_RESCAN_AFTER: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// How the filter treats one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    /// Scan the object this run.
    Scan,
    /// Leave the object out and count it as skipped.
    Skip,
    /// Leave the object out silently; its last clean scan is recent.
    UpToDate,
}

/// Decides whether a stored object is scanned this run.
pub trait EligibilityPredicate: Send + Sync + Debug {
    /// Classifies one object. Must not fail: unreadable metadata means
    /// the object gets scanned.
    fn classify(&self, object: &StoredObject) -> Eligibility;
}

/// Skips objects larger than a byte limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimit {
    /// Largest size that is still scanned.
    pub max_file_size: u64,
}

impl SizeLimit {
    /// Creates a size predicate.
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }
}

impl Default for SizeLimit {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

impl EligibilityPredicate for SizeLimit {
    fn classify(&self, object: &StoredObject) -> Eligibility {
        if object.size > self.max_file_size {
            Eligibility::Skip
        } else {
            Eligibility::Scan
        }
    }
}

/// Rescans objects whose last clean verdict is missing or too old.
#[derive(Debug, Clone)]
pub struct Staleness {
    threshold: Duration,
    now: Option<DateTime<Utc>>,
}

impl Staleness {
    /// Creates a staleness predicate with the given threshold.
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            now: None,
        }
    }

    /// Pins the reference time instead of reading the clock.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Returns the staleness threshold.
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    fn is_fresh(&self, scanned_at: DateTime<Utc>) -> bool {
        let now = self.now.unwrap_or_else(Utc::now);
        match (now - scanned_at).to_std() {
            Ok(age) => age <= self.threshold,
            // Negative age: the timestamp is in the future.
            Err(_) => true,
        }
    }
}

impl Default for Staleness {
    fn default() -> Self {
        Self::new(DEFAULT_RESCAN_AFTER)
    }
}

impl EligibilityPredicate for Staleness {
    fn classify(&self, object: &StoredObject) -> Eligibility {
        if object.scan_status() != Some("clean") {
            return Eligibility::Scan;
        }
        match object.scan_timestamp().and_then(parse_scan_timestamp) {
            Some(scanned_at) if self.is_fresh(scanned_at) => Eligibility::UpToDate,
            _ => Eligibility::Scan,
        }
    }
}

/// Size check first, then staleness.
#[derive(Debug, Clone, Default)]
pub struct Composite {
    /// Size predicate, evaluated first.
    pub size: SizeLimit,
    /// Staleness predicate, evaluated for objects within the size limit.
    pub staleness: Staleness,
}

impl Composite {
    /// Combines a size and a staleness predicate.
    pub fn new(size: SizeLimit, staleness: Staleness) -> Self {
        Self { size, staleness }
    }
}

impl EligibilityPredicate for Composite {
    fn classify(&self, object: &StoredObject) -> Eligibility {
        match self.size.classify(object) {
            Eligibility::Scan => self.staleness.classify(object),
            other => other,
        }
    }
}

/// Parses a `scan-timestamp` tag: RFC 3339 or integer epoch milliseconds.
pub fn parse_scan_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    let millis: i64 = raw.parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SCAN_STATUS_KEY, SCAN_TIMESTAMP_KEY};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn tagged(status: &str, timestamp: &str) -> StoredObject {
        StoredObject::new("k", 10)
            .with_metadata(SCAN_STATUS_KEY, status)
            .with_metadata(SCAN_TIMESTAMP_KEY, timestamp)
    }

    #[test]
    fn test_size_limit_boundary() {
        let predicate = SizeLimit::new(100);
        assert_eq!(predicate.classify(&StoredObject::new("a", 100)), Eligibility::Scan);
        assert_eq!(predicate.classify(&StoredObject::new("b", 101)), Eligibility::Skip);
        assert_eq!(SizeLimit::default().max_file_size, 26_214_400);
    }

    #[test]
    fn test_staleness_classification() {
        let predicate = Staleness::default().at(now());
        let recent = (now() - chrono::Duration::days(1)).to_rfc3339();
        let stale = (now() - chrono::Duration::days(8)).to_rfc3339();

        assert_eq!(predicate.classify(&tagged("clean", &recent)), Eligibility::UpToDate);
        assert_eq!(predicate.classify(&tagged("clean", &stale)), Eligibility::Scan);
        assert_eq!(predicate.classify(&tagged("infected", &recent)), Eligibility::Scan);
        assert_eq!(predicate.classify(&tagged("CLEAN", &recent)), Eligibility::Scan);
        assert_eq!(predicate.classify(&tagged("clean", "yesterday")), Eligibility::Scan);
        assert_eq!(predicate.classify(&StoredObject::new("k", 1)), Eligibility::Scan);

        let no_status = StoredObject::new("k", 1).with_metadata(SCAN_TIMESTAMP_KEY, recent);
        assert_eq!(predicate.classify(&no_status), Eligibility::Scan);

        let no_timestamp = StoredObject::new("k", 1).with_metadata(SCAN_STATUS_KEY, "clean");
        assert_eq!(predicate.classify(&no_timestamp), Eligibility::Scan);
    }

    #[test]
    fn test_staleness_accepts_epoch_millis_and_future() {
        let predicate = Staleness::default().at(now());
        let millis = (now() - chrono::Duration::hours(2)).timestamp_millis().to_string();
        assert_eq!(predicate.classify(&tagged("clean", &millis)), Eligibility::UpToDate);

        let future = (now() + chrono::Duration::days(30)).to_rfc3339();
        assert_eq!(predicate.classify(&tagged("clean", &future)), Eligibility::UpToDate);
    }

    #[test]
    fn test_composite_checks_size_first() {
        let predicate = Composite::new(SizeLimit::new(5), Staleness::default().at(now()));
        let recent = now().to_rfc3339();

        let big = tagged("clean", &recent);
        assert_eq!(predicate.classify(&big), Eligibility::Skip);

        let small = StoredObject::new("s", 3)
            .with_metadata(SCAN_STATUS_KEY, "clean")
            .with_metadata(SCAN_TIMESTAMP_KEY, recent);
        assert_eq!(predicate.classify(&small), Eligibility::UpToDate);
        assert_eq!(
            predicate.classify(&StoredObject::new("u", 3)),
            Eligibility::Scan
        );
    }

    #[test]
    fn test_parse_scan_timestamp() {
        assert!(parse_scan_timestamp("2024-01-01T00:00:00+02:00").is_some());
        assert_eq!(
            parse_scan_timestamp("0").map(|t| t.timestamp()),
            Some(0)
        );
        assert!(parse_scan_timestamp("not a date").is_none());
        assert!(parse_scan_timestamp("").is_none());
    }
}
