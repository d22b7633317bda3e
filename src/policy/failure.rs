//! Failure policy evaluation.

use crate::core::RunSummary;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which summary counters fail a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailurePolicy {
    /// Fail when any object was skipped.
    pub fail_on_skipped: bool,
    /// Fail when any object could not be scanned.
    pub fail_on_error: bool,
    /// Fail when any object is infected.
    pub fail_on_infected: bool,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            fail_on_skipped: true,
            fail_on_error: true,
            fail_on_infected: true,
        }
    }
}

impl FailurePolicy {
    /// Creates the strict default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never fails.
    pub fn permissive() -> Self {
        Self {
            fail_on_skipped: false,
            fail_on_error: false,
            fail_on_infected: false,
        }
    }

    /// Sets whether skipped objects fail the run.
    pub fn with_fail_on_skipped(mut self, enabled: bool) -> Self {
        self.fail_on_skipped = enabled;
        self
    }

    /// Sets whether errors fail the run.
    pub fn with_fail_on_error(mut self, enabled: bool) -> Self {
        self.fail_on_error = enabled;
        self
    }

    /// Sets whether infected objects fail the run.
    pub fn with_fail_on_infected(mut self, enabled: bool) -> Self {
        self.fail_on_infected = enabled;
        self
    }

    /// Evaluates a finished run. The first enabled counter that is
    /// non-zero, checked as skipped, errors, infected, is the reason.
    pub fn evaluate(&self, summary: &RunSummary) -> PolicyDecision {
        let counts = &summary.counts;
        let reason = if self.fail_on_skipped && counts.skipped > 0 {
            Some(FailureReason::Skipped {
                count: counts.skipped,
            })
        } else if self.fail_on_error && counts.errors > 0 {
            Some(FailureReason::Errors {
                count: counts.errors,
            })
        } else if self.fail_on_infected && counts.infected > 0 {
            Some(FailureReason::Infected {
                count: counts.infected,
            })
        } else {
            None
        };

        PolicyDecision {
            passed: reason.is_none(),
            reason,
        }
    }
}

/// Why a run failed the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureReason {
    /// Objects were skipped.
    Skipped {
        /// How many.
        count: u64,
    },
    /// Objects could not be scanned.
    Errors {
        /// How many.
        count: u64,
    },
    /// Objects are infected.
    Infected {
        /// How many.
        count: u64,
    },
}

impl FailureReason {
    /// Returns the counter name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped { .. } => "skipped",
            Self::Errors { .. } => "errors",
            Self::Infected { .. } => "infected",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped { count } => write!(f, "{} object(s) skipped", count),
            Self::Errors { count } => write!(f, "{} object(s) could not be scanned", count),
            Self::Infected { count } => write!(f, "{} infected object(s) found", count),
        }
    }
}

/// The binary outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Whether the run passed.
    pub passed: bool,
    /// The first failing counter, when the run failed.
    pub reason: Option<FailureReason>,
}

impl PolicyDecision {
    /// Returns the process exit code for this decision.
    pub fn exit_code(&self) -> u8 {
        if self.passed {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SummaryCounts;

    fn summary(skipped: u64, errors: u64, infected: u64) -> RunSummary {
        let mut summary = RunSummary::new();
        summary.counts = SummaryCounts {
            success: infected,
            clean: 0,
            infected,
            errors,
            skipped,
        };
        summary
    }

    #[test]
    fn test_empty_run_passes() {
        let decision = FailurePolicy::default().evaluate(&summary(0, 0, 0));
        assert!(decision.passed);
        assert_eq!(decision.reason, None);
        assert_eq!(decision.exit_code(), 0);
    }

    #[test]
    fn test_reason_order() {
        let policy = FailurePolicy::default();
        assert_eq!(
            policy.evaluate(&summary(1, 1, 1)).reason,
            Some(FailureReason::Skipped { count: 1 })
        );
        assert_eq!(
            policy.evaluate(&summary(0, 2, 1)).reason,
            Some(FailureReason::Errors { count: 2 })
        );
        assert_eq!(
            policy.evaluate(&summary(0, 0, 3)).reason,
            Some(FailureReason::Infected { count: 3 })
        );
    }

    #[test]
    fn test_each_flag_gates_one_counter() {
        let all = summary(1, 1, 1);

        let no_skip = FailurePolicy::default().with_fail_on_skipped(false);
        assert_eq!(no_skip.evaluate(&all).reason.map(|r| r.as_str()), Some("errors"));

        let infected_only = FailurePolicy::permissive().with_fail_on_infected(true);
        assert_eq!(
            infected_only.evaluate(&all).reason.map(|r| r.as_str()),
            Some("infected")
        );
        assert!(infected_only.evaluate(&summary(5, 5, 0)).passed);

        let decision = FailurePolicy::permissive().evaluate(&all);
        assert!(decision.passed);
        assert_eq!(decision.exit_code(), 0);
    }

    #[test]
    fn test_failed_exit_code() {
        let decision = FailurePolicy::default().evaluate(&summary(0, 0, 1));
        assert!(!decision.passed);
        assert_eq!(decision.exit_code(), 1);
        assert_eq!(
            decision.reason.unwrap().to_string(),
            "1 infected object(s) found"
        );
    }
}
