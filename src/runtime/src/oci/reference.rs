//! Image reference parsing.
//!
//! Parses image references like `ghcr.io/org/app:v0.1.0` into structured
//! components. Unlike a pull client, the parsed form keeps the registry
//! optional so that a discovered reference can be re-rooted under the
//! destination registry without inventing a `library/` namespace.

use std::cmp::Ordering;

use secure_import_core::error::{ImportError, Result};

/// Registry used when a reference carries no explicit host.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Parsed container image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    /// Registry hostname with optional port (e.g., "ghcr.io", "localhost:5000")
    pub registry: Option<String>,
    /// Repository path (e.g., "bitnami/nginx", "my-image")
    pub repository: String,
    /// Tag (e.g., "latest", "v0.1.0")
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123...")
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// Supports formats:
    /// - `postgres:13` → repository `postgres`, tag `13`
    /// - `my-repo/app:v1` → repository `my-repo/app`, tag `v1`
    /// - `ghcr.io/org/app:tag` → registry `ghcr.io`, repository `org/app`
    /// - `localhost:5000/app:dev` → registry `localhost:5000`, repository `app`
    /// - `ghcr.io/org/app@sha256:abc...` → digest reference
    ///
    /// A tag or a digest is mandatory.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ImportError::OciImageError(
                "Empty image reference".to_string(),
            ));
        }

        // Split off digest first (@ separator)
        let (name_tag, digest) = if let Some(at_pos) = reference.rfind('@') {
            let digest_part = &reference[at_pos + 1..];
            if !digest_part.contains(':') {
                return Err(ImportError::OciImageError(format!(
                    "Invalid digest format in reference '{}': expected algorithm:hex",
                    reference
                )));
            }
            (&reference[..at_pos], Some(digest_part.to_string()))
        } else {
            (reference, None)
        };

        // Split tag on the last colon after the last slash
        let last_segment_start = name_tag.rfind('/').map_or(0, |pos| pos + 1);
        let (name, tag) = match name_tag[last_segment_start..].rfind(':') {
            Some(colon_pos) => {
                let split = last_segment_start + colon_pos;
                (&name_tag[..split], Some(name_tag[split + 1..].to_string()))
            }
            None => (name_tag, None),
        };

        if tag.as_deref().is_some_and(str::is_empty) {
            return Err(ImportError::OciImageError(format!(
                "Empty tag in reference '{}'",
                reference
            )));
        }
        if tag.is_none() && digest.is_none() {
            return Err(ImportError::OciImageError(format!(
                "Reference '{}' has neither a tag nor a digest",
                reference
            )));
        }

        let (registry, repository) = Self::split_registry_repository(name)?;

        Ok(ImageReference {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Split a name into optional registry and repository components.
    fn split_registry_repository(name: &str) -> Result<(Option<String>, String)> {
        // The first component is a registry when it looks like a hostname
        // (contains a dot or colon, or is "localhost")
        if let Some(slash_pos) = name.find('/') {
            let first = &name[..slash_pos];
            if first.contains('.') || first.contains(':') || first == "localhost" {
                let repo = &name[slash_pos + 1..];
                if repo.is_empty() {
                    return Err(ImportError::OciImageError(format!(
                        "Empty repository in reference '{}'",
                        name
                    )));
                }
                return Ok((Some(first.to_string()), repo.to_string()));
            }
        }

        if name.is_empty() {
            return Err(ImportError::OciImageError(
                "Empty repository in image reference".to_string(),
            ));
        }

        Ok((None, name.to_string()))
    }

    /// Registry to pull from, defaulting to Docker Hub.
    pub fn registry_or_default(&self) -> &str {
        self.registry.as_deref().unwrap_or(DEFAULT_REGISTRY)
    }

    /// Reference to pull the original image from.
    pub fn source(&self) -> ImageReference {
        ImageReference {
            registry: Some(self.registry_or_default().to_string()),
            ..self.clone()
        }
    }

    /// The same repository and tag re-rooted under `target_registry`.
    pub fn in_registry(&self, target_registry: &str) -> ImageReference {
        ImageReference {
            registry: Some(target_registry.trim_end_matches('/').to_string()),
            repository: self.repository.clone(),
            tag: self.tag.clone(),
            digest: None,
        }
    }

    /// The same repository pinned to `digest`, tag dropped.
    pub fn with_digest(&self, digest: &str) -> ImageReference {
        ImageReference {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: None,
            digest: Some(digest.to_string()),
        }
    }

    /// Canonical string form.
    pub fn full_reference(&self) -> String {
        let mut s = match self.registry {
            Some(ref registry) => format!("{}/{}", registry, self.repository),
            None => self.repository.clone(),
        };
        if let Some(ref tag) = self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(ref digest) = self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}

impl std::str::FromStr for ImageReference {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialOrd for ImageReference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ImageReference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.full_reference().cmp(&other.full_reference())
    }
}
