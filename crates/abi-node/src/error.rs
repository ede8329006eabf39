use thiserror::Error;

/// Errors from encoding or decoding a node record.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The record was produced by an incompatible tool version.
    #[error("unsupported node format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// The record is too short to hold a version tag.
    #[error("truncated node record: {len} bytes")]
    Truncated { len: usize },

    #[error("failed to decode node: {0}")]
    Decode(String),

    #[error("failed to encode node: {0}")]
    Encode(String),
}

pub type NodeResult<T> = Result<T, NodeError>;
