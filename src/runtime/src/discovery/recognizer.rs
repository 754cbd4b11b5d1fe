//! Candidate extraction from document trees.
//!
//! Two rules produce candidates:
//!
//! - **Structural**: a mapping with scalar `repository` and `tag` children
//!   yields `"{repository}:{tag}"` and is not descended into.
//! - **Scalar**: a trimmed scalar matching the image grammar is a candidate.
//!   Flag-style values (`--image=registry/repo:tag`) yield the text after
//!   the last `=` when it contains a `/` and matches the grammar.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::tree::Node;

/// Anchored image grammar: optional `host[:port]/`, path segments, mandatory tag.
static IMAGE_GRAMMAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[A-Za-z0-9][A-Za-z0-9.-]*(?::[0-9]+)?/)?[A-Za-z0-9_-]+(?:/[A-Za-z0-9_-]+)*:[A-Za-z0-9._+-]+$",
    )
    .expect("image grammar is a valid regex")
});

/// Whether `text` matches the image grammar end to end.
pub fn matches_image_grammar(text: &str) -> bool {
    IMAGE_GRAMMAR.is_match(text)
}

/// Which rule produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrigin {
    /// `repository` + `tag` mapping.
    Structural,
    /// Whole scalar value.
    Scalar,
    /// Text after the last `=` of a scalar.
    Embedded,
}

/// A raw string that might denote an image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    pub origin: CandidateOrigin,
}

impl Candidate {
    fn new(text: impl Into<String>, origin: CandidateOrigin) -> Self {
        Self {
            text: text.into(),
            origin,
        }
    }
}

/// Walk `root` depth-first and collect candidates in document order.
///
/// Duplicates are kept. Structural candidates are not checked against
/// the grammar here.
pub fn recognize(root: &Node) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    walk(root, &mut candidates);
    candidates
}

fn walk(node: &Node, out: &mut Vec<Candidate>) {
    match node {
        Node::Mapping(pairs) => {
            if let Some(candidate) = structural_candidate(pairs) {
                out.push(candidate);
                return;
            }
        }
        Node::Scalar(text) => {
            out.extend(scalar_candidate(text));
            return;
        }
        Node::Document(_) | Node::Sequence(_) => {}
    }
    for child in node.children() {
        walk(child, out);
    }
}

fn structural_candidate(pairs: &[(Node, Node)]) -> Option<Candidate> {
    // Later keys override earlier ones, as in a decoded map.
    let scalars: HashMap<&str, &str> = pairs
        .iter()
        .filter_map(|(key, value)| Some((key.as_scalar()?, value.as_scalar()?)))
        .collect();

    let repository = scalars.get("repository")?;
    let tag = scalars.get("tag")?;
    Some(Candidate::new(
        format!("{}:{}", repository, tag),
        CandidateOrigin::Structural,
    ))
}

fn scalar_candidate(text: &str) -> Option<Candidate> {
    let trimmed = text.trim();
    if matches_image_grammar(trimmed) {
        return Some(Candidate::new(trimmed, CandidateOrigin::Scalar));
    }

    let (_, embedded) = trimmed.rsplit_once('=')?;
    (embedded.contains('/') && matches_image_grammar(embedded))
        .then(|| Candidate::new(embedded, CandidateOrigin::Embedded))
}
