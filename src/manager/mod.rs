//! Scan orchestration.
//!
//! The `ScanOrchestrator` lists the bucket, filters it down to the eligible
//! objects and scans them one at a time, retrying failed attempts with
//! exponential backoff and folding every outcome into a `RunSummary`.

mod context;
mod orchestrator;
mod retry;

pub use context::RunContext;
pub use orchestrator::{OrchestratorConfig, ScanOrchestrator, ScanOrchestratorBuilder};
pub use retry::RetryConfig;
