//! The scan orchestrator.

use crate::audit;
use crate::core::{
    ArcScanner, FailureCause, Metadata, ObjectStatus, RunSummary, ScanError, ScanOutcome,
    ScanVerdict, SCAN_STATUS_KEY, SCAN_TIMESTAMP_KEY,
};
use crate::credentials::CredentialCache;
use crate::eligibility::{select, EligibilityPredicate, SizeLimit};
use crate::manager::context::RunContext;
use crate::manager::retry::RetryConfig;
use crate::store::ArcObjectStore;

use chrono::{SecondsFormat, Utc};
use tokio::time::Instant;
use uuid::Uuid;

/// Configuration for the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Retry configuration applied to each object.
    pub retry: RetryConfig,

    /// Maximum number of objects scanned per run.
    pub limit: Option<usize>,

    /// Whether to write `scan-status` and `scan-timestamp` back to the
    /// store after each verdict.
    pub tag_results: bool,
}

impl OrchestratorConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Caps the number of objects scanned.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Enables or disables result tagging.
    pub fn with_tag_results(mut self, enabled: bool) -> Self {
        self.tag_results = enabled;
        self
    }
}

/// Builder for creating a `ScanOrchestrator`.
pub struct ScanOrchestratorBuilder {
    scanner: Option<ArcScanner>,
    store: Option<ArcObjectStore>,
    credentials: Option<CredentialCache>,
    predicate: Option<Box<dyn EligibilityPredicate>>,
    config: OrchestratorConfig,
}

impl ScanOrchestratorBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            scanner: None,
            store: None,
            credentials: None,
            predicate: None,
            config: OrchestratorConfig::default(),
        }
    }

    /// Sets the scanner.
    pub fn with_scanner(mut self, scanner: ArcScanner) -> Self {
        self.scanner = Some(scanner);
        self
    }

    /// Sets the object store.
    pub fn with_store(mut self, store: ArcObjectStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the credential cache refreshed before store access.
    pub fn with_credentials(mut self, cache: CredentialCache) -> Self {
        self.credentials = Some(cache);
        self
    }

    /// Sets the eligibility predicate. Defaults to the size limit.
    pub fn with_predicate<P: EligibilityPredicate + 'static>(mut self, predicate: P) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Sets a boxed eligibility predicate.
    pub fn with_boxed_predicate(mut self, predicate: Box<dyn EligibilityPredicate>) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the orchestrator.
    pub fn build(self) -> Result<ScanOrchestrator, ScanError> {
        let scanner = self
            .scanner
            .ok_or_else(|| ScanError::configuration("A scanner is required"))?;
        let store = self
            .store
            .ok_or_else(|| ScanError::configuration("An object store is required"))?;

        let mut context = RunContext::new(store);
        if let Some(cache) = self.credentials {
            context = context.with_credentials(cache);
        }

        Ok(ScanOrchestrator {
            scanner,
            context,
            predicate: self
                .predicate
                .unwrap_or_else(|| Box::new(SizeLimit::default())),
            config: self.config,
        })
    }
}

impl Default for ScanOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Where one object is in its retry cycle.
#[derive(Debug)]
enum AttemptState {
    Pending,
    Attempting { attempt: u32 },
    Retrying { attempt: u32, error: ScanError },
    Succeeded { attempt: u32, verdict: ScanVerdict },
    Failed { attempt: u32, error: ScanError },
}

/// Scans every eligible object of a bucket, one at a time.
pub struct ScanOrchestrator {
    scanner: ArcScanner,
    context: RunContext,
    predicate: Box<dyn EligibilityPredicate>,
    config: OrchestratorConfig,
}

impl ScanOrchestrator {
    /// Creates a new builder.
    pub fn builder() -> ScanOrchestratorBuilder {
        ScanOrchestratorBuilder::new()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs one pass over the bucket.
    ///
    /// Only credential and listing failures abort the run; failures of
    /// individual objects end up in the summary.
    pub async fn run(&mut self) -> Result<RunSummary, ScanError> {
        let started = Instant::now();
        let mut summary = RunSummary::new();
        let store = self.context.store().clone();

        self.context.refresh().await?;

        let selection =
            select(store.list_objects(), &*self.predicate, self.config.limit).await?;

        summary.enumerated = selection.enumerated;
        summary.selected = selection.keys.len() as u64;
        summary.up_to_date = selection.up_to_date;
        summary.counts.skipped = selection.skipped;

        audit::emit_scan_started(
            &summary.run_id,
            store.name(),
            selection.keys.len(),
            selection.skipped,
        );

        if selection.is_empty() {
            tracing::info!(
                bucket = %store.name(),
                skipped = selection.skipped,
                up_to_date = selection.up_to_date,
                "No objects to scan"
            );
        }

        for key in &selection.keys {
            let outcome = self.process(&summary.run_id, &store, key).await;
            summary.record(key.as_str(), outcome);
        }

        summary.finish(started.elapsed());
        audit::emit_run_completed(&summary);
        Ok(summary)
    }

    /// Drives one object to a terminal outcome.
    async fn process(
        &mut self,
        run_id: &Uuid,
        store: &ArcObjectStore,
        key: &str,
    ) -> ScanOutcome {
        let started = Instant::now();
        let mut state = AttemptState::Pending;

        loop {
            state = match state {
                AttemptState::Pending => AttemptState::Attempting { attempt: 1 },

                AttemptState::Attempting { attempt } => match self.attempt(store, key).await {
                    Ok(verdict) => AttemptState::Succeeded { attempt, verdict },
                    Err(error)
                        if error.is_retryable() && self.config.retry.should_retry(attempt) =>
                    {
                        AttemptState::Retrying { attempt, error }
                    }
                    Err(error) => AttemptState::Failed { attempt, error },
                },

                AttemptState::Retrying { attempt, error } => {
                    let delay = self.config.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        key = %key,
                        attempt = attempt,
                        max_attempts = self.config.retry.max_attempts,
                        error = %error,
                        delay_ms = delay.as_millis() as u64,
                        "Scan attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    AttemptState::Attempting {
                        attempt: attempt + 1,
                    }
                }

                AttemptState::Succeeded { attempt, verdict } => {
                    let elapsed = started.elapsed();
                    audit::emit_object_scanned(run_id, key, &verdict, attempt, elapsed);
                    if self.config.tag_results {
                        tag_result(store, key, &verdict).await;
                    }
                    return ScanOutcome::Success {
                        verdict,
                        attempts: attempt,
                        elapsed,
                    };
                }

                AttemptState::Failed { attempt, error } => {
                    let cause = FailureCause::from(&error);
                    let status = match store.stat_object(key).await {
                        Ok(metadata) => ObjectStatus::from_metadata(metadata),
                        Err(stat_error) => {
                            tracing::debug!(
                                key = %key,
                                error = %stat_error,
                                "Failed to stat object after scan failure"
                            );
                            ObjectStatus::unavailable(stat_error)
                        }
                    };
                    audit::emit_object_failed(run_id, key, &cause, attempt);
                    return ScanOutcome::Error {
                        cause,
                        status,
                        attempts: attempt,
                        elapsed: started.elapsed(),
                    };
                }
            };
        }
    }

    /// One fetch-and-scan attempt.
    async fn attempt(
        &mut self,
        store: &ArcObjectStore,
        key: &str,
    ) -> Result<ScanVerdict, ScanError> {
        self.context.refresh().await?;

        let stream = store
            .get_object(key)
            .await?
            .ok_or_else(|| ScanError::StreamUnavailable {
                key: key.to_string(),
            })?;

        self.scanner.scan(stream).await
    }
}

/// Writes the verdict tags back to the store. Failures are only logged.
async fn tag_result(store: &ArcObjectStore, key: &str, verdict: &ScanVerdict) {
    let mut tags = Metadata::new();
    tags.insert(SCAN_STATUS_KEY.to_string(), verdict.status_tag().to_string());
    tags.insert(
        SCAN_TIMESTAMP_KEY.to_string(),
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    );

    if let Err(e) = store.put_metadata(key, tags).await {
        tracing::warn!(key = %key, error = %e, "Failed to tag scan result");
    }
}
