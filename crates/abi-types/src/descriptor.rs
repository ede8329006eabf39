use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::hash::{ArtifactDigest, FileIdentityHash};

/// One artifact comparison request, and the key under which its result is cached.
///
/// Built by the orchestrator once per build step and never mutated. Equality and
/// hashing are by value, so two independently built descriptors for the same
/// artifact state share one cache entry.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyDescriptor {
    /// Path to the current artifact.
    pub file: PathBuf,
    /// Digest of the previous artifact version, or `None` on a first build.
    pub old_digest: Option<ArtifactDigest>,
    /// Identity stamped onto every diffed entry produced for this artifact.
    pub file_identity: FileIdentityHash,
}

impl DependencyDescriptor {
    /// Descriptor for an artifact with no previous version: everything is new.
    pub fn first_build(file: impl Into<PathBuf>, file_identity: FileIdentityHash) -> Self {
        Self {
            file: file.into(),
            old_digest: None,
            file_identity,
        }
    }

    /// Descriptor for an artifact that replaced the version with `old_digest`.
    pub fn incremental(
        file: impl Into<PathBuf>,
        old_digest: ArtifactDigest,
        file_identity: FileIdentityHash,
    ) -> Self {
        Self {
            file: file.into(),
            old_digest: Some(old_digest),
            file_identity,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Returns `true` if a previous version exists.
    pub fn has_previous(&self) -> bool {
        self.old_digest.is_some()
    }
}

impl fmt::Debug for DependencyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyDescriptor")
            .field("file", &self.file)
            .field("old_digest", &self.old_digest.map(|d| d.short_hex()))
            .field("file_identity", &self.file_identity)
            .finish()
    }
}
