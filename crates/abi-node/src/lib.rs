//! Dependency nodes and their binary records.
//!
//! A node is the decoded ABI of one compiled class. Nodes are stored inside
//! artifacts as self-describing records:
//!
//! ```text
//! [u32 little-endian format version][bincode-encoded ClassNode]
//! ```
//!
//! A record whose version tag differs from [`NODE_FORMAT_VERSION`] is a hard
//! error: it means the artifact was written by an incompatible tool.

pub mod codec;
pub mod error;
pub mod node;
pub mod reader;

pub use codec::{encode_node, read_node, NODE_FORMAT_VERSION};
pub use error::{NodeError, NodeResult};
pub use node::{ClassNode, MemberSignature, ACC_INTERFACE, ACC_PROTECTED, ACC_PUBLIC};
pub use reader::{ClassNodeReader, CountingReader, NodeReader};
