use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use crate::entry::{
    le_array, DirectoryEntry, ARTIFACT_MAGIC, CONTAINER_VERSION, HEADER_LEN, TRAILER_LEN,
    TRAILER_MAGIC,
};
use crate::error::{JarError, JarResult};
use crate::index::{NodeIndex, NODE_INDEX_FILENAME};

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match self {
            Self::Mapped(map) => &map[..],
            Self::Owned(data) => data.as_slice(),
        }
    }
}

/// A read-only snapshot of one artifact.
///
/// The file is memory-mapped on [`AbiJar::open`]; node records are handed out
/// as borrowed slices of the mapping. The mapping is released on drop.
pub struct AbiJar {
    path: PathBuf,
    backing: Backing,
    entries: HashMap<String, DirectoryEntry>,
}

impl AbiJar {
    /// Memory-map and validate an artifact on disk.
    pub fn open(path: &Path) -> JarResult<Self> {
        let io_err = |e| JarError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        let file = File::open(path).map_err(io_err)?;
        let len = file.metadata().map_err(io_err)?.len();
        if len < (HEADER_LEN + TRAILER_LEN) as u64 {
            return Err(JarError::CorruptDirectory {
                path: path.to_path_buf(),
                reason: format!("file is only {len} bytes"),
            });
        }
        // SAFETY: artifacts are immutable build outputs; the orchestrator
        // never rewrites a file while a diff holds it open.
        let map = unsafe { Mmap::map(&file) }.map_err(io_err)?;
        Self::parse(path.to_path_buf(), Backing::Mapped(map))
    }

    /// Wrap artifact bytes already in memory. `path` is used only in errors.
    pub fn from_bytes(path: impl Into<PathBuf>, data: Vec<u8>) -> JarResult<Self> {
        Self::parse(path.into(), Backing::Owned(data))
    }

    fn parse(path: PathBuf, backing: Backing) -> JarResult<Self> {
        let data = backing.bytes();
        let corrupt = |reason: String| JarError::CorruptDirectory {
            path: path.clone(),
            reason,
        };

        if data.len() < HEADER_LEN + TRAILER_LEN {
            return Err(corrupt(format!("artifact is only {} bytes", data.len())));
        }
        if &data[0..4] != ARTIFACT_MAGIC {
            return Err(JarError::NotAnArtifact {
                path: path.clone(),
                actual: String::from_utf8_lossy(&data[0..4]).into(),
            });
        }
        let version = u32::from_le_bytes(le_array(&data[4..8]));
        if version != CONTAINER_VERSION {
            return Err(JarError::UnsupportedVersion {
                path: path.clone(),
                version,
            });
        }

        let trailer = &data[data.len() - TRAILER_LEN..];
        if &trailer[12..16] != TRAILER_MAGIC {
            return Err(corrupt("missing trailer".into()));
        }
        let dir_offset = u64::from_le_bytes(le_array(&trailer[0..8]));
        let count = u32::from_le_bytes(le_array(&trailer[8..12])) as usize;
        let dir_end = data.len() - TRAILER_LEN;
        if dir_offset < HEADER_LEN as u64 || dir_offset > dir_end as u64 {
            return Err(corrupt(format!("directory offset {dir_offset} out of range")));
        }

        let mut entries = HashMap::with_capacity(count);
        let mut pos = dir_offset as usize;
        for _ in 0..count {
            let (entry, consumed) = DirectoryEntry::decode(&data[pos..dir_end]).map_err(corrupt)?;
            pos += consumed;
            if entry.offset < HEADER_LEN as u64 || entry.end() > dir_offset {
                return Err(corrupt(format!(
                    "entry {} points outside the data region",
                    entry.name
                )));
            }
            if let Some(dup) = entries.insert(entry.name.clone(), entry) {
                return Err(corrupt(format!("duplicate entry {}", dup.name)));
            }
        }
        if pos != dir_end {
            return Err(corrupt(format!(
                "{} trailing bytes after directory",
                dir_end - pos
            )));
        }

        debug!(path = %path.display(), entries = entries.len(), bytes = data.len(), "artifact opened");
        Ok(Self {
            path,
            backing,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total artifact size in bytes.
    pub fn byte_len(&self) -> u64 {
        self.backing.bytes().len() as u64
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Entry names in unspecified order.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Read a named entry, verifying its CRC32.
    pub fn entry(&self, name: &str) -> JarResult<Option<&[u8]>> {
        let Some(entry) = self.entries.get(name) else {
            return Ok(None);
        };
        let bytes = self.slice(entry.offset, entry.size)?;
        if crc32fast::hash(bytes) != entry.crc32 {
            return Err(JarError::CrcMismatch {
                path: self.path.clone(),
                name: name.to_string(),
            });
        }
        Ok(Some(bytes))
    }

    /// The raw node index blob, if the artifact has one.
    pub fn index_blob(&self) -> JarResult<Option<&[u8]>> {
        self.entry(NODE_INDEX_FILENAME)
    }

    /// Zero-copy view of `size` bytes at `offset`.
    pub fn slice(&self, offset: u64, size: u32) -> JarResult<&[u8]> {
        let data = self.backing.bytes();
        let end = offset.checked_add(size as u64);
        match end {
            Some(end) if end <= data.len() as u64 => Ok(&data[offset as usize..end as usize]),
            _ => Err(JarError::Truncated {
                path: self.path.clone(),
                offset,
                size: size as u64,
                len: data.len() as u64,
            }),
        }
    }

    /// Decode the embedded node index.
    pub fn read_node_index(&self) -> JarResult<NodeIndex> {
        let blob = self.index_blob()?.ok_or_else(|| JarError::MissingNodeIndex {
            path: self.path.clone(),
        })?;
        let index = NodeIndex::from_bytes(blob).map_err(|e| JarError::InvalidIndex {
            path: self.path.clone(),
            source: Box::new(e),
        })?;
        debug!(path = %self.path.display(), nodes = index.len(), "node index decoded");
        Ok(index)
    }
}

impl std::fmt::Debug for AbiJar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbiJar")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .field("bytes", &self.byte_len())
            .finish()
    }
}
