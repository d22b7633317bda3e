//! Object store access for the bucket being scanned.
//!
//! The orchestrator only talks to the bucket through [`ObjectStore`]. Two
//! implementations ship with the crate: an in-memory store and a local
//! directory tree treated as a bucket.

mod filesystem;
mod memory;
mod traits;

pub use filesystem::{LocalFsObjectStore, METADATA_INDEX};
pub use memory::InMemoryObjectStore;
pub use traits::{ArcObjectStore, ObjectStore};
