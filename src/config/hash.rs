//! Desired-state hashing for change detection.
//!
//! The polled delta source uses these hashes to decide whether a file's
//! content is a new delta worth enqueueing; passes also log the hash so a
//! report can be matched back to the document that produced it.

use sha2::{Digest, Sha256};

use super::spec::{DesiredContainerSpec, DesiredSet};

/// Hasher for computing desired-state hashes.
#[derive(Debug, Default)]
pub struct DeltaHasher;

impl DeltaHasher {
    /// Creates a new delta hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of an entire desired set.
    ///
    /// The set serializes from a `BTreeMap`, so the byte stream is already
    /// canonical for a given membership.
    #[must_use]
    pub fn hash_set(&self, set: &DesiredSet) -> String {
        let mut hasher = Sha256::new();

        for (name, spec) in set.iter() {
            hasher.update(name.as_bytes());
            hasher.update([0]);
            hasher.update(self.hash_spec(spec).as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a hash for a single desired container spec.
    #[must_use]
    pub fn hash_spec(&self, spec: &DesiredContainerSpec) -> String {
        let mut hasher = Sha256::new();

        hasher.update(spec.image.as_bytes());
        if let Some(tag) = &spec.tag {
            hasher.update(tag.as_bytes());
        }
        hasher.update(spec.network_mode().as_bytes());
        hasher.update([u8::from(spec.wants_running())]);

        for (host, container) in &spec.volumes {
            hasher.update(host.as_bytes());
            hasher.update([0]);
            hasher.update(container.as_bytes());
        }

        for (container_port, host_port) in &spec.ports {
            hasher.update(container_port.as_bytes());
            hasher.update([0]);
            hasher.update(host_port.as_bytes());
        }

        hex::encode(hasher.finalize())
    }
}
