//! Candidate selection over a bucket listing.

use crate::core::error::StoreError;
use crate::core::StoredObject;
use crate::eligibility::predicate::{Eligibility, EligibilityPredicate};

use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Result of filtering one listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Keys to scan, in listing order, without duplicates.
    pub keys: Vec<String>,
    /// Objects excluded for a skip reason.
    pub skipped: u64,
    /// Objects excluded because their last clean scan is recent.
    pub up_to_date: u64,
    /// Objects visited, directory placeholders included.
    pub enumerated: u64,
}

impl Selection {
    /// Returns `true` if nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Runs `predicate` over a listing and collects the candidates.
///
/// With a `limit`, enumeration stops once that many keys are selected;
/// objects not yet visited are neither selected nor counted. A listing
/// error aborts the selection.
pub async fn select<S>(
    objects: S,
    predicate: &dyn EligibilityPredicate,
    limit: Option<usize>,
) -> Result<Selection, StoreError>
where
    S: Stream<Item = Result<StoredObject, StoreError>>,
{
    let mut selection = Selection::default();
    let mut seen = HashSet::new();

    if limit == Some(0) {
        return Ok(selection);
    }

    let mut objects = Box::pin(objects);
    while let Some(object) = objects.next().await {
        let object = object?;
        selection.enumerated += 1;

        if object.is_directory_placeholder() {
            continue;
        }

        match predicate.classify(&object) {
            Eligibility::Scan => {
                if seen.insert(object.key.clone()) {
                    selection.keys.push(object.key);
                }
            }
            Eligibility::Skip => {
                tracing::debug!(key = %object.key, size = object.size, "Skipping object");
                selection.skipped += 1;
            }
            Eligibility::UpToDate => selection.up_to_date += 1,
        }

        if limit.is_some_and(|n| selection.keys.len() >= n) {
            break;
        }
    }

    Ok(selection)
}
