//! `bucketscan` binary: one scan pass over a bucket, configured through
//! environment variables. Prints the run summary as JSON and exits 0 when
//! the failure policy passes, 1 otherwise.

use anyhow::Context;
use bucketscan::audit;
use bucketscan::backends::ClamAvScanner;
use bucketscan::credentials::{CredentialCache, EnvCredentialProvider};
use bucketscan::store::LocalFsObjectStore;
use bucketscan::{ScanOrchestrator, Scanner, Settings};

use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = ?e, "Scan run failed");
            ExitCode::from(1)
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let settings = Settings::from_env().context("failed to read settings")?;

    let store = LocalFsObjectStore::new(&settings.bucket_root).with_context(|| {
        format!("failed to open bucket at {}", settings.bucket_root.display())
    })?;
    let scanner =
        ClamAvScanner::new(settings.clamav.clone()).context("invalid ClamAV configuration")?;

    if let Some(version) = scanner.version().await {
        tracing::info!(version = %version, "Connected to clamd");
    }

    let mut builder = ScanOrchestrator::builder()
        .with_store(Arc::new(store))
        .with_scanner(Arc::new(scanner))
        .with_boxed_predicate(settings.predicate())
        .with_config(settings.orchestrator_config());

    let provider = EnvCredentialProvider::new();
    if provider.is_configured() {
        builder = builder.with_credentials(CredentialCache::new(Arc::new(provider)));
    }

    let mut orchestrator = builder.build()?;
    let summary = orchestrator.run().await.context("scan run aborted")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("failed to serialize summary")?
    );

    let decision = settings.policy.evaluate(&summary);
    audit::emit_policy_decision(&summary.run_id, &decision);
    if let Some(reason) = decision.reason {
        tracing::warn!(reason = %reason, "Failure policy not satisfied");
    }

    Ok(ExitCode::from(decision.exit_code()))
}
