//! Error types for the diff crate.

use std::path::PathBuf;

use abi_jar::JarError;
use abi_node::NodeError;
use abi_types::{ArtifactDigest, PathHash};

/// Errors that abort a diff computation. There is no partial result.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// Opening an artifact or decoding its index failed.
    #[error(transparent)]
    Jar(#[from] JarError),

    /// A node record could not be decoded.
    #[error("cannot decode node {path_hash} in artifact {artifact}: {source}")]
    NodeDecode {
        artifact: PathBuf,
        path_hash: PathHash,
        #[source]
        source: NodeError,
    },

    /// The descriptor names a previous version but no artifact was supplied for it.
    #[error("previous version {digest} of artifact {artifact} is unavailable")]
    PreviousArtifactUnavailable {
        artifact: PathBuf,
        digest: ArtifactDigest,
    },

    /// The computation was stopped before it finished.
    #[error("diff computation cancelled")]
    Cancelled,

    /// The background worker running the computation died.
    #[error("diff worker failed: {0}")]
    Worker(String),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
