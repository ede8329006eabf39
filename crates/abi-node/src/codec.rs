use crate::error::{NodeError, NodeResult};
use crate::node::ClassNode;

/// Node record format version accepted by this build.
///
/// Bump on any change to [`ClassNode`]'s serialized layout. Records with any
/// other tag are rejected outright, never migrated.
pub const NODE_FORMAT_VERSION: u32 = 1;

/// Size of the little-endian version tag that prefixes every record.
const VERSION_TAG_LEN: usize = 4;

/// Encode a node as `[u32 LE version][bincode payload]`.
pub fn encode_node(node: &ClassNode) -> NodeResult<Vec<u8>> {
    let payload = bincode::serialize(node).map_err(|e| NodeError::Encode(e.to_string()))?;
    let mut buf = Vec::with_capacity(VERSION_TAG_LEN + payload.len());
    buf.extend_from_slice(&NODE_FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode a node record, checking its version tag first.
pub fn read_node(bytes: &[u8]) -> NodeResult<ClassNode> {
    let payload = strip_version_tag(bytes)?;
    bincode::deserialize(payload).map_err(|e| NodeError::Decode(e.to_string()))
}

/// Validate the leading version tag and return the payload after it.
pub fn strip_version_tag(bytes: &[u8]) -> NodeResult<&[u8]> {
    if bytes.len() < VERSION_TAG_LEN {
        return Err(NodeError::Truncated { len: bytes.len() });
    }
    let mut tag = [0u8; VERSION_TAG_LEN];
    tag.copy_from_slice(&bytes[..VERSION_TAG_LEN]);
    let found = u32::from_le_bytes(tag);
    if found != NODE_FORMAT_VERSION {
        return Err(NodeError::UnsupportedVersion {
            found,
            expected: NODE_FORMAT_VERSION,
        });
    }
    Ok(&bytes[VERSION_TAG_LEN..])
}
