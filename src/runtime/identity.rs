//! Derivation of logical container identity from raw image references.

use serde::{Deserialize, Serialize};

/// Logical identity of a container, derived from its image reference.
///
/// Derivation is a pure string split: the same raw reference always yields
/// the same identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ContainerIdentity {
    /// Last path segment of the image reference, before any tag.
    pub name: String,
    /// Full reference minus the tag.
    pub image: String,
    /// Tag, absent if the reference carries none.
    pub tag: Option<String>,
}

impl ContainerIdentity {
    /// Parses a raw image reference into its logical identity.
    ///
    /// The tag delimiter is the last colon whose suffix contains no `/`, so
    /// an untagged reference on a port-qualified registry
    /// (`registry:5000/app`) parses as having no tag. Digest references
    /// (`repo/app@sha256:...`) are a known limitation: the digest hex is
    /// read as the tag.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let (image, tag) = match raw.rfind(':') {
            Some(idx) if !raw[idx + 1..].is_empty() && !raw[idx + 1..].contains('/') => {
                (&raw[..idx], Some(raw[idx + 1..].to_string()))
            }
            _ => (raw, None),
        };

        let name = image.rsplit('/').next().unwrap_or(image).to_string();

        Self {
            name,
            image: image.to_string(),
            tag,
        }
    }
}

impl std::fmt::Display for ContainerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}:{tag}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
