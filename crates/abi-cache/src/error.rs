//! Error types for the cache crate.

use std::path::PathBuf;
use std::sync::Arc;

use abi_diff::DiffError;

/// Errors returned by [`DiffCache`](crate::DiffCache) and its collaborators.
///
/// A failed computation is delivered to every waiter attached to it, so the
/// underlying [`DiffError`] is shared behind an `Arc` and this type is `Clone`.
#[derive(Clone, Debug, thiserror::Error)]
pub enum CacheError {
    /// The diff computation failed.
    #[error(transparent)]
    Diff(Arc<DiffError>),

    /// The cache was shut down before the request completed.
    #[error("diff cache has been shut down")]
    Shutdown,

    /// A configuration value failed validation.
    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Reading or writing the artifact history failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// The diff failure behind this error, if any.
    pub fn diff_error(&self) -> Option<&DiffError> {
        match self {
            Self::Diff(err) => Some(err),
            _ => None,
        }
    }
}

/// Convenience alias for cache results.
pub type CacheResult<T> = Result<T, CacheError>;
