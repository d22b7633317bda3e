//! Scan result structures.
//!
//! This module defines the per-object `ScanOutcome` and the `RunSummary`
//! that aggregates all outcomes of one run.

use crate::core::error::ScanError;
use crate::core::types::{ObjectStatus, ScanVerdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Why an object ended up in the `Error` state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCause {
    /// Short error kind (see [`ScanError::kind`]).
    pub kind: String,
    /// Full error message of the last attempt.
    pub message: String,
}

impl From<&ScanError> for FailureCause {
    fn from(err: &ScanError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Terminal result for one object after retries are exhausted or a scan
/// succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// The daemon returned a verdict.
    Success {
        /// The verdict.
        verdict: ScanVerdict,
        /// Number of attempts used, including the successful one.
        attempts: u32,
        /// Time spent on this object, backoff included.
        #[serde(rename = "elapsed_seconds", with = "duration_secs")]
        elapsed: Duration,
    },

    /// Every attempt failed.
    Error {
        /// Cause of the last failed attempt.
        cause: FailureCause,
        /// Store state captured after the last failure.
        status: ObjectStatus,
        /// Number of attempts made.
        attempts: u32,
        /// Time spent on this object, backoff included.
        #[serde(rename = "elapsed_seconds", with = "duration_secs")]
        elapsed: Duration,
    },
}

impl ScanOutcome {
    /// Returns `true` for a clean verdict.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Success { verdict, .. } if verdict.is_clean())
    }

    /// Returns `true` for an infected verdict.
    pub fn is_infected(&self) -> bool {
        matches!(self, Self::Success { verdict, .. } if verdict.is_infected())
    }

    /// Returns `true` if the object could not be scanned.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Returns the verdict, if the scan succeeded.
    pub fn verdict(&self) -> Option<&ScanVerdict> {
        match self {
            Self::Success { verdict, .. } => Some(verdict),
            Self::Error { .. } => None,
        }
    }

    /// Returns the number of attempts made.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::Error { attempts, .. } => *attempts,
        }
    }
}

/// An outcome retained in the run summary, keyed by object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Key of the object.
    pub key: String,
    /// What happened to it.
    pub outcome: ScanOutcome,
}

/// Aggregate counters of a run.
///
/// `success == clean + infected` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    /// Objects that received a verdict.
    pub success: u64,
    /// Objects found clean.
    pub clean: u64,
    /// Objects found infected.
    pub infected: u64,
    /// Objects whose every attempt failed.
    pub errors: u64,
    /// Objects excluded by the eligibility filter for a skip reason.
    pub skipped: u64,
}

/// Summary of one scan run.
///
/// Clean scans are only counted; infected verdicts and errors are also
/// kept in `results`, in processing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique identifier of the run.
    pub run_id: Uuid,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: Option<DateTime<Utc>>,

    /// Aggregate counters.
    pub counts: SummaryCounts,

    /// Objects visited by the listing, directory placeholders included.
    pub enumerated: u64,

    /// Objects selected for scanning.
    pub selected: u64,

    /// Objects not scanned because their last clean scan is recent.
    pub up_to_date: u64,

    /// Anomalies in detail: infected verdicts and errors.
    pub results: Vec<ScanRecord>,

    /// Wall-clock time of the whole run.
    #[serde(rename = "duration_seconds", with = "duration_secs")]
    pub duration: Duration,
}

impl RunSummary {
    /// Creates an empty summary for a run starting now.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            completed_at: None,
            counts: SummaryCounts::default(),
            enumerated: 0,
            selected: 0,
            up_to_date: 0,
            results: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Folds one terminal outcome into the counters.
    pub fn record(&mut self, key: impl Into<String>, outcome: ScanOutcome) {
        match &outcome {
            ScanOutcome::Success { verdict, .. } => {
                self.counts.success += 1;
                if verdict.is_infected() {
                    self.counts.infected += 1;
                } else {
                    self.counts.clean += 1;
                    return;
                }
            }
            ScanOutcome::Error { .. } => self.counts.errors += 1,
        }

        self.results.push(ScanRecord {
            key: key.into(),
            outcome,
        });
    }

    /// Stamps the completion time and total duration.
    pub fn finish(&mut self, duration: Duration) {
        self.duration = duration;
        self.completed_at = Some(Utc::now());
    }

    /// Returns the records of infected objects.
    pub fn infected(&self) -> impl Iterator<Item = &ScanRecord> {
        self.results.iter().filter(|r| r.outcome.is_infected())
    }

    /// Returns the records of objects that could not be scanned.
    pub fn failures(&self) -> impl Iterator<Item = &ScanRecord> {
        self.results.iter().filter(|r| r.outcome.is_error())
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

/// Serde helper storing a `Duration` as fractional seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(verdict: ScanVerdict) -> ScanOutcome {
        ScanOutcome::Success {
            verdict,
            attempts: 1,
            elapsed: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_clean_success_is_counted_not_kept() {
        let mut summary = RunSummary::new();
        summary.record("a", success(ScanVerdict::clean()));

        assert_eq!(summary.counts.success, 1);
        assert_eq!(summary.counts.clean, 1);
        assert!(summary.results.is_empty());
    }

    #[test]
    fn test_anomalies_are_kept_in_order() {
        let mut summary = RunSummary::new();
        summary.record("bad", success(ScanVerdict::infected("Win.Test")));
        summary.record(
            "broken",
            ScanOutcome::Error {
                cause: FailureCause {
                    kind: "transport".into(),
                    message: "connection refused".into(),
                },
                status: ObjectStatus::unavailable("stat failed"),
                attempts: 3,
                elapsed: Duration::from_secs(6),
            },
        );

        assert_eq!(summary.counts.success, 1);
        assert_eq!(summary.counts.infected, 1);
        assert_eq!(summary.counts.errors, 1);
        let keys: Vec<_> = summary.results.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, ["bad", "broken"]);
        assert_eq!(summary.infected().count(), 1);
        assert_eq!(summary.failures().count(), 1);
    }

    #[test]
    fn test_summary_serializes_duration_seconds() {
        let mut summary = RunSummary::new();
        summary.finish(Duration::from_millis(1500));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["duration_seconds"], serde_json::json!(1.5));
        assert!(json["completed_at"].is_string());
        assert_eq!(json["counts"]["skipped"], serde_json::json!(0));
    }
}
