//! Core types used throughout the bucketscan library.
//!
//! This module defines the stored-object snapshot produced by a bucket
//! listing, the verdict returned by a scanning engine, and the metadata
//! tags used to remember prior scans.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// User metadata attached to a stored object.
pub type Metadata = BTreeMap<String, String>;

/// Metadata tag holding the last scan verdict (`clean` or `infected`).
pub const SCAN_STATUS_KEY: &str = "scan-status";

/// Metadata tag holding when the last scan finished.
pub const SCAN_TIMESTAMP_KEY: &str = "scan-timestamp";

/// Path separator used by the object store for directory placeholders.
pub const PATH_SEPARATOR: char = '/';

/// A stored object as enumerated by the bucket listing.
///
/// This is an immutable snapshot for the duration of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Key of the object, unique within the bucket.
    pub key: String,

    /// Size of the object in bytes.
    pub size: u64,

    /// User metadata, possibly including scan tags.
    #[serde(default)]
    pub metadata: Metadata,
}

impl StoredObject {
    /// Creates a new stored object with empty metadata.
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            metadata: Metadata::new(),
        }
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns `true` if the key is a directory placeholder.
    pub fn is_directory_placeholder(&self) -> bool {
        self.key.ends_with(PATH_SEPARATOR)
    }

    /// Returns the stored scan status tag, if any.
    pub fn scan_status(&self) -> Option<&str> {
        self.metadata.get(SCAN_STATUS_KEY).map(String::as_str)
    }

    /// Returns the raw stored scan timestamp tag, if any.
    pub fn scan_timestamp(&self) -> Option<&str> {
        self.metadata.get(SCAN_TIMESTAMP_KEY).map(String::as_str)
    }
}

/// The result of one successful protocol exchange with a scanning engine.
///
/// `virus_name` is present exactly when the object is infected, and is
/// never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanVerdict {
    is_infected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    virus_name: Option<String>,
}

impl ScanVerdict {
    /// Creates a clean verdict.
    pub fn clean() -> Self {
        Self {
            is_infected: false,
            virus_name: None,
        }
    }

    /// Creates an infected verdict.
    ///
    /// An empty signature name is reported as `"Unknown"`.
    pub fn infected(virus_name: impl Into<String>) -> Self {
        let name = virus_name.into();
        let name = if name.trim().is_empty() {
            "Unknown".to_string()
        } else {
            name
        };
        Self {
            is_infected: true,
            virus_name: Some(name),
        }
    }

    /// Returns `true` if the engine found a threat.
    pub fn is_infected(&self) -> bool {
        self.is_infected
    }

    /// Returns `true` if no threat was found.
    pub fn is_clean(&self) -> bool {
        !self.is_infected
    }

    /// Returns the signature name reported by the engine.
    pub fn virus_name(&self) -> Option<&str> {
        self.virus_name.as_deref()
    }

    /// Returns the value written to the `scan-status` tag.
    pub fn status_tag(&self) -> &'static str {
        if self.is_infected {
            "infected"
        } else {
            "clean"
        }
    }
}

impl fmt::Display for ScanVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.virus_name {
            Some(name) => write!(f, "infected ({})", name),
            None => write!(f, "clean"),
        }
    }
}

/// Best-effort snapshot of an object's store state, captured for
/// diagnostics when scanning it failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStatus {
    /// Metadata returned by the store, when the stat succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,

    /// Why the stat failed, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ObjectStatus {
    /// Creates a snapshot from fetched metadata.
    pub fn from_metadata(metadata: Metadata) -> Self {
        Self {
            metadata: Some(metadata),
            error: None,
        }
    }

    /// Creates a snapshot recording that the stat itself failed.
    pub fn unavailable(error: impl fmt::Display) -> Self {
        Self {
            metadata: None,
            error: Some(error.to_string()),
        }
    }
}
