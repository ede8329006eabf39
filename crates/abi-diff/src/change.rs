//! Result types of an artifact diff.

use std::collections::HashMap;
use std::fmt;

use abi_types::{FileIdentityHash, PathHash};
use serde::{Deserialize, Serialize};

/// Identity of one diffed entry: which artifact, which inner path.
///
/// Nodes are payload, not identity, so this key needs no node equality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AbiJarSource {
    pub file_identity: FileIdentityHash,
    pub path_hash: PathHash,
}

impl AbiJarSource {
    pub fn new(file_identity: FileIdentityHash, path_hash: PathHash) -> Self {
        Self {
            file_identity,
            path_hash,
        }
    }
}

impl fmt::Display for AbiJarSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_identity, self.path_hash)
    }
}

/// How an entry differs between the two snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Changed,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Changed => write!(f, "changed"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Sides<N> {
    Added { new: N },
    Changed { old: N, new: N },
    Deleted { old: N },
}

/// Old and new node for one changed entry.
///
/// At least one side is always present; the constructors are the only way to
/// build an item.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeUpdateItem<N> {
    source: AbiJarSource,
    sides: Sides<N>,
}

impl<N> NodeUpdateItem<N> {
    pub fn added(source: AbiJarSource, new: N) -> Self {
        Self {
            source,
            sides: Sides::Added { new },
        }
    }

    pub fn changed(source: AbiJarSource, old: N, new: N) -> Self {
        Self {
            source,
            sides: Sides::Changed { old, new },
        }
    }

    pub fn deleted(source: AbiJarSource, old: N) -> Self {
        Self {
            source,
            sides: Sides::Deleted { old },
        }
    }

    pub fn source(&self) -> &AbiJarSource {
        &self.source
    }

    pub fn kind(&self) -> ChangeKind {
        match self.sides {
            Sides::Added { .. } => ChangeKind::Added,
            Sides::Changed { .. } => ChangeKind::Changed,
            Sides::Deleted { .. } => ChangeKind::Deleted,
        }
    }

    /// The node from the previous artifact; `None` when added.
    pub fn old_node(&self) -> Option<&N> {
        match &self.sides {
            Sides::Added { .. } => None,
            Sides::Changed { old, .. } | Sides::Deleted { old } => Some(old),
        }
    }

    /// The node from the current artifact; `None` when deleted.
    pub fn new_node(&self) -> Option<&N> {
        match &self.sides {
            Sides::Deleted { .. } => None,
            Sides::Added { new } | Sides::Changed { new, .. } => Some(new),
        }
    }
}

/// Counts per change kind, plus entries skipped as unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub added: usize,
    pub changed: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

impl DiffStats {
    /// Number of nodes that had to be decoded to produce the diff.
    pub fn decoded_nodes(&self) -> usize {
        self.added + 2 * self.changed + self.deleted
    }
}

/// Changed-or-added and deleted entries between two artifact snapshots.
#[derive(Clone, Debug)]
pub struct AbiDiff<N> {
    pub changed_or_added: HashMap<AbiJarSource, NodeUpdateItem<N>>,
    pub deleted: HashMap<AbiJarSource, NodeUpdateItem<N>>,
    /// Entries present in both snapshots with equal digests.
    pub unchanged: usize,
}

impl<N> AbiDiff<N> {
    pub fn new() -> Self {
        Self {
            changed_or_added: HashMap::new(),
            deleted: HashMap::new(),
            unchanged: 0,
        }
    }

    /// Returns `true` if nothing was added, changed or deleted.
    pub fn is_empty(&self) -> bool {
        self.changed_or_added.is_empty() && self.deleted.is_empty()
    }

    /// Total number of reported entries.
    pub fn len(&self) -> usize {
        self.changed_or_added.len() + self.deleted.len()
    }

    pub fn stats(&self) -> DiffStats {
        let added = self
            .changed_or_added
            .values()
            .filter(|item| item.kind() == ChangeKind::Added)
            .count();
        DiffStats {
            added,
            changed: self.changed_or_added.len() - added,
            deleted: self.deleted.len(),
            unchanged: self.unchanged,
        }
    }

    /// All reported items, changed-or-added first.
    pub fn items(&self) -> impl Iterator<Item = &NodeUpdateItem<N>> {
        self.changed_or_added.values().chain(self.deleted.values())
    }
}

impl<N> Default for AbiDiff<N> {
    fn default() -> Self {
        Self::new()
    }
}
