use std::collections::HashMap;

use abi_types::{NodeDigest, PathHash};

use crate::entry::le_array;
use crate::error::{JarError, JarResult};

/// Reserved entry name holding the node index blob.
pub const NODE_INDEX_FILENAME: &str = "META-INF/abi/node-index.bin";

const INDEX_MAGIC: &[u8; 4] = b"ABNI";
/// Current node index layout version.
pub const INDEX_VERSION: u32 = 1;

/// magic + version + count
const INDEX_HEADER_LEN: usize = 12;
/// path hash + offset + size + digest
const INDEX_RECORD_LEN: usize = 8 + 8 + 4 + NodeDigest::LEN;

/// Location and fingerprint of one stored node record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeIndexEntry {
    /// Absolute byte offset of the record within the artifact.
    pub offset: u64,
    pub size: u32,
    pub digest: NodeDigest,
}

/// Mapping from inner-path hash to node record location, decoded once per
/// opened artifact and read-only afterwards.
///
/// Layout of the serialized blob (little-endian):
/// - magic `ABNI`, `u32` version, `u32` entry count
/// - per entry, sorted by path hash: `u64` path hash, `u64` offset, `u32` size, 16-byte digest
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeIndex {
    entries: HashMap<PathHash, NodeIndexEntry>,
}

impl NodeIndex {
    /// Build an index, rejecting duplicate path hashes.
    pub fn build(
        entries: impl IntoIterator<Item = (PathHash, NodeIndexEntry)>,
    ) -> JarResult<Self> {
        let mut map = HashMap::new();
        for (hash, entry) in entries {
            if map.insert(hash, entry).is_some() {
                return Err(JarError::IndexCorrupted(format!(
                    "duplicate path hash {hash}"
                )));
            }
        }
        Ok(Self { entries: map })
    }

    pub fn get(&self, hash: &PathHash) -> Option<&NodeIndexEntry> {
        self.entries.get(hash)
    }

    pub fn contains(&self, hash: &PathHash) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&PathHash, &NodeIndexEntry)> {
        self.entries.iter()
    }

    /// Serialize to the blob layout, entries sorted by path hash.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut sorted: Vec<_> = self.entries.iter().collect();
        sorted.sort_by_key(|(hash, _)| **hash);

        let mut buf = Vec::with_capacity(INDEX_HEADER_LEN + sorted.len() * INDEX_RECORD_LEN);
        buf.extend_from_slice(INDEX_MAGIC);
        buf.extend_from_slice(&INDEX_VERSION.to_le_bytes());
        buf.extend_from_slice(&(sorted.len() as u32).to_le_bytes());
        for (hash, entry) in sorted {
            buf.extend_from_slice(&hash.as_u64().to_le_bytes());
            buf.extend_from_slice(&entry.offset.to_le_bytes());
            buf.extend_from_slice(&entry.size.to_le_bytes());
            buf.extend_from_slice(entry.digest.as_bytes());
        }
        buf
    }

    /// Decode a blob produced by [`NodeIndex::to_bytes`].
    pub fn from_bytes(data: &[u8]) -> JarResult<Self> {
        if data.len() < INDEX_HEADER_LEN {
            return Err(JarError::IndexCorrupted("too short".into()));
        }
        if &data[0..4] != INDEX_MAGIC {
            return Err(JarError::IndexCorrupted(format!(
                "bad magic {:?}",
                String::from_utf8_lossy(&data[0..4])
            )));
        }
        let version = u32::from_le_bytes(le_array(&data[4..8]));
        if version != INDEX_VERSION {
            return Err(JarError::UnsupportedIndexVersion(version));
        }
        let count = u32::from_le_bytes(le_array(&data[8..12])) as usize;
        let needed = INDEX_HEADER_LEN + count * INDEX_RECORD_LEN;
        if data.len() != needed {
            return Err(JarError::IndexCorrupted(format!(
                "expected {needed} bytes for {count} entries, got {}",
                data.len()
            )));
        }

        let records = data[INDEX_HEADER_LEN..]
            .chunks_exact(INDEX_RECORD_LEN)
            .map(|rec| {
                let hash = PathHash::from_raw(u64::from_le_bytes(le_array(&rec[0..8])));
                let entry = NodeIndexEntry {
                    offset: u64::from_le_bytes(le_array(&rec[8..16])),
                    size: u32::from_le_bytes(le_array(&rec[16..20])),
                    digest: NodeDigest::from_raw(le_array(&rec[20..36])),
                };
                (hash, entry)
            });
        Self::build(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(offset: u64, size: u32, tag: u8) -> NodeIndexEntry {
        NodeIndexEntry {
            offset,
            size,
            digest: NodeDigest::from_raw([tag; 16]),
        }
    }

    #[test]
    fn build_empty_index() {
        let idx = NodeIndex::build(vec![]).unwrap();
        assert!(idx.is_empty());
        let bytes = idx.to_bytes();
        assert_eq!(bytes.len(), INDEX_HEADER_LEN);
        assert!(NodeIndex::from_bytes(&bytes).unwrap().is_empty());
    }

    #[test]
    fn blob_preserves_entries() {
        let a = PathHash::of("a/A.class");
        let b = PathHash::of("b/B.class");
        let idx = NodeIndex::build(vec![(a, entry(8, 40, 1)), (b, entry(48, 12, 2))]).unwrap();

        let decoded = NodeIndex::from_bytes(&idx.to_bytes()).unwrap();
        assert_eq!(decoded, idx);
        assert_eq!(decoded.get(&b), Some(&entry(48, 12, 2)));
        assert!(decoded.contains(&a));
        assert!(!decoded.contains(&PathHash::of("missing")));
    }

    #[test]
    fn blob_is_sorted_and_deterministic() {
        let pairs: Vec<_> = (0..20u64)
            .map(|i| (PathHash::from_raw(100 - i), entry(i, 1, i as u8)))
            .collect();
        let forward = NodeIndex::build(pairs.clone()).unwrap().to_bytes();
        let reverse = NodeIndex::build(pairs.into_iter().rev()).unwrap().to_bytes();
        assert_eq!(forward, reverse);
        let first = u64::from_le_bytes(le_array(&forward[12..20]));
        assert_eq!(first, 81);
    }

    #[test]
    fn build_rejects_duplicate_hash() {
        let h = PathHash::from_raw(1);
        let err = NodeIndex::build(vec![(h, entry(0, 1, 0)), (h, entry(1, 1, 0))]).unwrap_err();
        assert!(matches!(err, JarError::IndexCorrupted(_)));
    }

    #[test]
    fn from_bytes_bad_magic() {
        let err = NodeIndex::from_bytes(b"BADMxxxxxxxx").unwrap_err();
        assert!(matches!(err, JarError::IndexCorrupted(_)));
    }

    #[test]
    fn from_bytes_bad_version() {
        let mut data = Vec::new();
        data.extend_from_slice(INDEX_MAGIC);
        data.extend_from_slice(&9u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        let err = NodeIndex::from_bytes(&data).unwrap_err();
        assert!(matches!(err, JarError::UnsupportedIndexVersion(9)));
    }

    #[test]
    fn from_bytes_truncated_records() {
        let idx = NodeIndex::build(vec![(PathHash::from_raw(1), entry(0, 1, 0))]).unwrap();
        let bytes = idx.to_bytes();
        let err = NodeIndex::from_bytes(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, JarError::IndexCorrupted(_)));
    }

    #[test]
    fn from_bytes_too_short() {
        let err = NodeIndex::from_bytes(b"ABNI").unwrap_err();
        assert!(matches!(err, JarError::IndexCorrupted(_)));
    }
}
