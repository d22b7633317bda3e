//! Structured audit logging.
//!
//! Emits one `tracing` event per run milestone under the
//! `bucketscan::audit` target, so a subscriber can route them to a
//! separate sink (JSON file, log shipper, etc.).

mod events;

pub use events::{
    emit_object_failed, emit_object_scanned, emit_policy_decision, emit_run_completed,
    emit_scan_started,
};
