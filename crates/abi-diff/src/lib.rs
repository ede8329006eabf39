//! Incremental diff of ABI artifacts.
//!
//! Given the previous and current snapshot of one artifact, [`DiffComputer`]
//! reports which dependency nodes were added, changed or deleted. Entries
//! whose index digest is unchanged are never decoded.
//!
//! ```text
//! old index  {h1: d5, h2: d7}
//! new index  {h1: d5, h2: d9, h3: d1}
//!         => changed_or_added {h2 (old + new), h3 (new)}, deleted {}
//! ```
//!
//! Results are keyed by [`AbiJarSource`], the pure identity
//! `(file_identity, path_hash)`; old and new nodes travel in the
//! [`NodeUpdateItem`] payload.

pub mod change;
pub mod computer;
pub mod error;

pub use change::{AbiDiff, AbiJarSource, ChangeKind, DiffStats, NodeUpdateItem};
pub use computer::DiffComputer;
pub use error::{DiffError, DiffResult};
