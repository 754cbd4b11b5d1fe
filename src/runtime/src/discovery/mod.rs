//! Image discovery in rendered chart output.
//!
//! ```text
//! YAML stream ─► Node tree ─► recognize ─► classify ─► ReferenceSet
//! ```

pub mod classifier;
pub mod recognizer;
pub mod reference_set;
pub mod tree;

pub use classifier::{classify, RejectReason, Verdict};
pub use recognizer::{recognize, Candidate, CandidateOrigin};
pub use reference_set::ReferenceSet;
pub use tree::{parse_documents, Node};

use secure_import_core::error::Result;

use crate::oci::ImageReference;

/// Discover image references in a multi-document YAML stream.
///
/// Returns a deduplicated, sorted list. Invalid YAML is an error.
pub fn discover_images(rendered: &str) -> Result<Vec<ImageReference>> {
    let documents = parse_documents(rendered)?;

    let mut set = ReferenceSet::new();
    let mut rejected = 0usize;
    for candidate in documents.iter().flat_map(recognize) {
        match classify(&candidate.text) {
            Verdict::Accept => {
                set.insert(candidate.text);
            }
            Verdict::Reject(reason) => {
                rejected += 1;
                tracing::debug!(
                    candidate = %candidate.text,
                    origin = ?candidate.origin,
                    reason = %reason,
                    "Rejected image candidate"
                );
            }
        }
    }

    tracing::debug!(
        documents = documents.len(),
        accepted = set.len(),
        rejected,
        "Image discovery finished"
    );
    Ok(set.into_references())
}
