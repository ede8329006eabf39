//! Identity primitives for ABI dependency diffing.
//!
//! Every other crate in the workspace depends on `abi-types`.
//!
//! # Key Types
//!
//! - [`PathHash`]: 64-bit hash of an archive entry path, the node index key
//! - [`NodeDigest`]: 128-bit fingerprint of a stored node record
//! - [`ArtifactDigest`]: BLAKE3 digest of a whole artifact file
//! - [`FileIdentityHash`]: orchestrator-supplied artifact identity
//! - [`DependencyDescriptor`]: one diff request and its cache key

pub mod descriptor;
pub mod error;
pub mod hash;

pub use descriptor::DependencyDescriptor;
pub use error::TypeError;
pub use hash::{ArtifactDigest, FileIdentityHash, NodeDigest, PathHash};
