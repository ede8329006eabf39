use std::path::PathBuf;

use abi_node::NodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JarError {
    #[error("{path}: not an ABI artifact (magic {actual:?})")]
    NotAnArtifact { path: PathBuf, actual: String },

    #[error("{path}: unsupported artifact container version {version}")]
    UnsupportedVersion { path: PathBuf, version: u32 },

    #[error("{path}: corrupt entry directory: {reason}")]
    CorruptDirectory { path: PathBuf, reason: String },

    #[error("cannot find node index in artifact {path}")]
    MissingNodeIndex { path: PathBuf },

    #[error("invalid node index in artifact {path}: {source}")]
    InvalidIndex {
        path: PathBuf,
        #[source]
        source: Box<JarError>,
    },

    #[error("{path}: byte range {offset}+{size} exceeds artifact length {len}")]
    Truncated {
        path: PathBuf,
        offset: u64,
        size: u64,
        len: u64,
    },

    #[error("{path}: CRC32 mismatch for entry {name}")]
    CrcMismatch { path: PathBuf, name: String },

    #[error("unsupported node index version: {0}")]
    UnsupportedIndexVersion(u32),

    #[error("node index corrupted: {0}")]
    IndexCorrupted(String),

    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("entry name is reserved: {0}")]
    ReservedEntry(String),

    #[error("entry {name} is too large: {size} bytes")]
    EntryTooLarge { name: String, size: usize },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Node(#[from] NodeError),
}

pub type JarResult<T> = Result<T, JarError>;
