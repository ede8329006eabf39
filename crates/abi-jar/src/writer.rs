use std::collections::HashSet;
use std::path::Path;

use abi_node::{encode_node, ClassNode};
use abi_types::{ArtifactDigest, NodeDigest, PathHash};
use tracing::debug;

use crate::entry::{DirectoryEntry, ARTIFACT_MAGIC, CONTAINER_VERSION, TRAILER_MAGIC};
use crate::error::{JarError, JarResult};
use crate::index::{NodeIndex, NodeIndexEntry, NODE_INDEX_FILENAME};

/// Builds an ABI artifact in memory.
///
/// Entry data is stored uncompressed so that node index offsets address
/// records directly inside the finished file.
pub struct AbiJarWriter {
    data: Vec<u8>,
    entries: Vec<DirectoryEntry>,
    names: HashSet<String>,
    index: Vec<(PathHash, NodeIndexEntry)>,
    write_index: bool,
}

impl AbiJarWriter {
    pub fn new() -> Self {
        let mut data = Vec::new();
        data.extend_from_slice(ARTIFACT_MAGIC);
        data.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
        Self {
            data,
            entries: Vec::new(),
            names: HashSet::new(),
            index: Vec::new(),
            write_index: true,
        }
    }

    /// Omit the node index entry from the finished artifact.
    pub fn without_index(mut self) -> Self {
        self.write_index = false;
        self
    }

    /// Encode a class node and store it at `inner_path`.
    pub fn add_node(&mut self, inner_path: &str, node: &ClassNode) -> JarResult<PathHash> {
        let record = encode_node(node)?;
        self.add_record(inner_path, &record)
    }

    /// Store a pre-encoded node record at `inner_path` and index it.
    pub fn add_record(&mut self, inner_path: &str, record: &[u8]) -> JarResult<PathHash> {
        let entry = self.add_entry(inner_path, record)?;
        let hash = PathHash::of(inner_path);
        self.index.push((
            hash,
            NodeIndexEntry {
                offset: entry.offset,
                size: entry.size,
                digest: NodeDigest::of(record),
            },
        ));
        Ok(hash)
    }

    /// Store a raw, unindexed entry (resources, manifests).
    pub fn add_entry(&mut self, name: &str, bytes: &[u8]) -> JarResult<DirectoryEntry> {
        if name == NODE_INDEX_FILENAME {
            return Err(JarError::ReservedEntry(name.to_string()));
        }
        self.push_entry(name, bytes)
    }

    /// Number of entries added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the artifact to `path` and return its digest.
    pub fn finish(self, path: &Path) -> JarResult<ArtifactDigest> {
        let bytes = self.finish_to_bytes()?;
        std::fs::write(path, &bytes).map_err(|e| JarError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let digest = ArtifactDigest::of_bytes(&bytes);
        debug!(path = %path.display(), bytes = bytes.len(), digest = %digest.short_hex(), "artifact written");
        Ok(digest)
    }

    /// Finish the artifact in memory (no disk I/O).
    pub fn finish_to_bytes(mut self) -> JarResult<Vec<u8>> {
        if self.write_index {
            let index = NodeIndex::build(std::mem::take(&mut self.index))?;
            let blob = index.to_bytes();
            self.push_entry(NODE_INDEX_FILENAME, &blob)?;
        }

        let dir_offset = self.data.len() as u64;
        for entry in &self.entries {
            entry.encode(&mut self.data);
        }
        self.data.extend_from_slice(&dir_offset.to_le_bytes());
        self.data
            .extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        self.data.extend_from_slice(TRAILER_MAGIC);
        Ok(self.data)
    }

    fn push_entry(&mut self, name: &str, bytes: &[u8]) -> JarResult<DirectoryEntry> {
        if name.len() > u16::MAX as usize {
            return Err(JarError::EntryTooLarge {
                name: name.to_string(),
                size: name.len(),
            });
        }
        let size = u32::try_from(bytes.len()).map_err(|_| JarError::EntryTooLarge {
            name: name.to_string(),
            size: bytes.len(),
        })?;
        if !self.names.insert(name.to_string()) {
            return Err(JarError::DuplicateEntry(name.to_string()));
        }

        let entry = DirectoryEntry {
            name: name.to_string(),
            offset: self.data.len() as u64,
            size,
            crc32: crc32fast::hash(bytes),
        };
        self.data.extend_from_slice(bytes);
        self.entries.push(entry.clone());
        Ok(entry)
    }
}

impl Default for AbiJarWriter {
    fn default() -> Self {
        Self::new()
    }
}
