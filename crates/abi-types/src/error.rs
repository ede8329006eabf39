use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by identity type operations.
#[derive(Debug, Error)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("cannot read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
