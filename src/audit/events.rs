//! Audit event emission functions.

use crate::core::{FailureCause, RunSummary, ScanVerdict};
use crate::policy::PolicyDecision;

use std::time::Duration;
use uuid::Uuid;

/// Emits an audit event for a run whose candidates have been selected.
pub fn emit_scan_started(run_id: &Uuid, bucket: &str, selected: usize, skipped: u64) {
    tracing::info!(
        target: "bucketscan::audit",
        event_type = "scan_started",
        run_id = %run_id,
        bucket = %bucket,
        selected = selected,
        skipped = skipped,
        "Scan started"
    );
}

/// Emits an audit event for an object that received a verdict.
pub fn emit_object_scanned(
    run_id: &Uuid,
    key: &str,
    verdict: &ScanVerdict,
    attempts: u32,
    elapsed: Duration,
) {
    tracing::info!(
        target: "bucketscan::audit",
        event_type = "object_scanned",
        run_id = %run_id,
        key = %key,
        outcome = %verdict.status_tag(),
        virus_name = ?verdict.virus_name(),
        attempts = attempts,
        duration_ms = elapsed.as_millis() as u64,
        "Object scanned"
    );
}

/// Emits an audit event for an object whose every attempt failed.
pub fn emit_object_failed(run_id: &Uuid, key: &str, cause: &FailureCause, attempts: u32) {
    tracing::warn!(
        target: "bucketscan::audit",
        event_type = "object_failed",
        run_id = %run_id,
        key = %key,
        error_kind = %cause.kind,
        error = %cause.message,
        attempts = attempts,
        "Object could not be scanned"
    );
}

/// Emits an audit event for a finished run.
pub fn emit_run_completed(summary: &RunSummary) {
    tracing::info!(
        target: "bucketscan::audit",
        event_type = "run_completed",
        run_id = %summary.run_id,
        enumerated = summary.enumerated,
        selected = summary.selected,
        up_to_date = summary.up_to_date,
        success = summary.counts.success,
        clean = summary.counts.clean,
        infected = summary.counts.infected,
        errors = summary.counts.errors,
        skipped = summary.counts.skipped,
        duration_ms = summary.duration.as_millis() as u64,
        "Run completed"
    );
}

/// Emits an audit event for the failure policy decision.
pub fn emit_policy_decision(run_id: &Uuid, decision: &PolicyDecision) {
    tracing::info!(
        target: "bucketscan::audit",
        event_type = "policy_decision",
        run_id = %run_id,
        passed = decision.passed,
        reason = ?decision.reason.map(|r| r.to_string()),
        exit_code = decision.exit_code(),
        "Policy decision made"
    );
}
