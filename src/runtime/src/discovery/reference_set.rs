//! Deduplicated, sorted set of accepted references.

use std::collections::BTreeSet;

use crate::oci::ImageReference;

/// Accepted candidates, deduplicated by string equality.
#[derive(Debug, Default)]
pub struct ReferenceSet {
    entries: BTreeSet<String>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an accepted candidate. Returns false on a duplicate.
    pub fn insert(&mut self, candidate: impl Into<String>) -> bool {
        self.entries.insert(candidate.into())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lexicographically ordered references.
    pub fn into_references(self) -> Vec<ImageReference> {
        self.entries
            .into_iter()
            .filter_map(|entry| match ImageReference::parse(&entry) {
                Ok(reference) => Some(reference),
                Err(e) => {
                    tracing::debug!(candidate = %entry, error = %e, "Dropping unparsable candidate");
                    None
                }
            })
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for ReferenceSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = ReferenceSet::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}
