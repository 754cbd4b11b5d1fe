//! False-positive rejection for grammar-matching candidates.
//!
//! Rendered charts are full of strings shaped like `name:tag` that are not
//! images: service addresses, RBAC aggregation labels, Prometheus recording
//! rules. Each heuristic below splits the candidate on its last `:` and
//! looks at the repository and tag halves independently.

use super::recognizer::matches_image_grammar;

/// Tags that are plain words but are still real image tags.
const WORD_TAG_ALLOW_LIST: &[&str] = &[
    "latest",
    "stable",
    "dev",
    "prod",
    "test",
    "canary",
    "alpine",
    "scratch",
    "distroless",
    "slim",
];

/// Recording-rule prefixes seen in kube-prometheus style charts.
const METRIC_PREFIXES: &[&str] = &["apiserver_request", "count", "node_namespace_pod_container"];

/// Why a candidate was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Does not match the image grammar.
    Grammar,
    /// `service-name:8081` style address.
    PortReference,
    /// `component:aggregate-to-admin` style label.
    Label,
    /// `metric_prefix:burnrate5m` style recording rule.
    MetricName,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            RejectReason::Grammar => "grammar",
            RejectReason::PortReference => "port reference",
            RejectReason::Label => "label",
            RejectReason::MetricName => "metric name",
        };
        write!(f, "{}", reason)
    }
}

/// Classification result for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

type Heuristic = fn(&str, &str) -> bool;

/// Ordered heuristic chain; the first match rejects.
const HEURISTICS: &[(RejectReason, Heuristic)] = &[
    (RejectReason::PortReference, looks_like_port_reference),
    (RejectReason::Label, looks_like_label),
    (RejectReason::MetricName, looks_like_metric_name),
];

/// Classify a candidate string. Pure function of its text.
pub fn classify(candidate: &str) -> Verdict {
    if !matches_image_grammar(candidate) {
        return Verdict::Reject(RejectReason::Grammar);
    }
    let Some((repository, tag)) = candidate.rsplit_once(':') else {
        return Verdict::Reject(RejectReason::Grammar);
    };

    HEURISTICS
        .iter()
        .find(|(_, rejects)| rejects(repository, tag))
        .map_or(Verdict::Accept, |(reason, _)| Verdict::Reject(*reason))
}

fn looks_like_port_reference(repository: &str, tag: &str) -> bool {
    !repository.contains('/')
        && tag.len() >= 4
        && tag.chars().all(|c| c.is_ascii_digit())
        && repository.contains('-')
}

fn looks_like_label(repository: &str, tag: &str) -> bool {
    !repository.contains(['/', '.', ':'])
        && !tag.chars().any(|c| c.is_ascii_digit())
        && !WORD_TAG_ALLOW_LIST.contains(&tag)
        && tag.chars().all(|c| c.is_ascii_alphabetic() || c == '-')
}

fn looks_like_metric_name(repository: &str, tag: &str) -> bool {
    if repository.contains('/') || !METRIC_PREFIXES.contains(&repository) {
        return false;
    }
    tag.starts_with("availability")
        || tag.starts_with("burnrate")
        || tag.starts_with("container_memory_")
        || is_up_counter(tag)
        || ends_with_duration(tag)
}

/// `up<digits>`
fn is_up_counter(tag: &str) -> bool {
    tag.strip_prefix("up")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// `...<digit><s|m|h|d>`
fn ends_with_duration(tag: &str) -> bool {
    let mut rev = tag.chars().rev();
    matches!(rev.next(), Some('s' | 'm' | 'h' | 'd')) && rev.next().is_some_and(|c| c.is_ascii_digit())
}
