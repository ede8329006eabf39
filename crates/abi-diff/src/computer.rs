//! Node-level diff between two artifact snapshots.
//!
//! Entries are compared by path hash and digest. Only entries that were
//! added, deleted, or whose digest changed are decoded; equal digests are
//! skipped without touching the record bytes.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use abi_jar::{AbiJar, NodeIndexEntry};
use abi_node::NodeReader;
use abi_types::{DependencyDescriptor, FileIdentityHash, PathHash};
use tracing::debug;

use crate::change::{AbiDiff, AbiJarSource, NodeUpdateItem};
use crate::error::{DiffError, DiffResult};

/// Computes [`AbiDiff`]s, decoding nodes with `R`.
///
/// Stateless between calls; one instance can serve any number of artifacts.
#[derive(Clone, Debug, Default)]
pub struct DiffComputer<R> {
    reader: R,
}

impl<R: NodeReader> DiffComputer<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Diff the artifact named by `descriptor` against its previous version.
    ///
    /// `old_file` is only consulted when the descriptor has an old digest; in
    /// that case it must be present. Both artifacts are opened for the
    /// duration of the call and released on every exit path.
    pub fn diff(
        &self,
        descriptor: &DependencyDescriptor,
        old_file: Option<&Path>,
        new_file: &Path,
    ) -> DiffResult<AbiDiff<R::Node>> {
        self.diff_until(descriptor, old_file, new_file, &AtomicBool::new(false))
    }

    /// Like [`diff`](Self::diff), but gives up with [`DiffError::Cancelled`]
    /// once `cancel` is set. The flag is checked before every node decode.
    pub fn diff_until(
        &self,
        descriptor: &DependencyDescriptor,
        old_file: Option<&Path>,
        new_file: &Path,
        cancel: &AtomicBool,
    ) -> DiffResult<AbiDiff<R::Node>> {
        let identity = descriptor.file_identity;
        let Some(digest) = descriptor.old_digest else {
            let new_jar = AbiJar::open(new_file)?;
            return self.snapshots_until(None, &new_jar, identity, cancel);
        };

        let old_file = old_file.ok_or_else(|| DiffError::PreviousArtifactUnavailable {
            artifact: descriptor.file.clone(),
            digest,
        })?;
        let old_jar = AbiJar::open(old_file)?;
        let new_jar = AbiJar::open(new_file)?;
        self.snapshots_until(Some(&old_jar), &new_jar, identity, cancel)
    }

    /// Diff two opened snapshots. `old == None` treats every entry as added.
    pub fn diff_snapshots(
        &self,
        old: Option<&AbiJar>,
        new: &AbiJar,
        identity: FileIdentityHash,
    ) -> DiffResult<AbiDiff<R::Node>> {
        self.snapshots_until(old, new, identity, &AtomicBool::new(false))
    }

    fn snapshots_until(
        &self,
        old: Option<&AbiJar>,
        new: &AbiJar,
        identity: FileIdentityHash,
        cancel: &AtomicBool,
    ) -> DiffResult<AbiDiff<R::Node>> {
        let new_index = new.read_node_index()?;
        let mut diff = AbiDiff::new();

        let Some(old) = old else {
            for (hash, entry) in new_index.iter() {
                let source = AbiJarSource::new(identity, *hash);
                let node = self.decode(new, *hash, entry, cancel)?;
                diff.changed_or_added
                    .insert(source, NodeUpdateItem::added(source, node));
            }
            debug!(
                artifact = %new.path().display(),
                added = diff.changed_or_added.len(),
                "diffed artifact without previous version"
            );
            return Ok(diff);
        };

        let old_index = old.read_node_index()?;

        for (hash, new_entry) in new_index.iter() {
            let source = AbiJarSource::new(identity, *hash);
            let item = match old_index.get(hash) {
                Some(old_entry) if old_entry.digest == new_entry.digest => {
                    diff.unchanged += 1;
                    continue;
                }
                Some(old_entry) => {
                    let old_node = self.decode(old, *hash, old_entry, cancel)?;
                    let new_node = self.decode(new, *hash, new_entry, cancel)?;
                    NodeUpdateItem::changed(source, old_node, new_node)
                }
                None => NodeUpdateItem::added(source, self.decode(new, *hash, new_entry, cancel)?),
            };
            diff.changed_or_added.insert(source, item);
        }

        for (hash, old_entry) in old_index.iter() {
            if new_index.contains(hash) {
                continue;
            }
            let source = AbiJarSource::new(identity, *hash);
            let node = self.decode(old, *hash, old_entry, cancel)?;
            diff.deleted.insert(source, NodeUpdateItem::deleted(source, node));
        }

        let stats = diff.stats();
        debug!(
            artifact = %new.path().display(),
            previous = %old.path().display(),
            added = stats.added,
            changed = stats.changed,
            deleted = stats.deleted,
            unchanged = stats.unchanged,
            "diffed artifact"
        );
        Ok(diff)
    }

    fn decode(
        &self,
        jar: &AbiJar,
        hash: PathHash,
        entry: &NodeIndexEntry,
        cancel: &AtomicBool,
    ) -> DiffResult<R::Node> {
        if cancel.load(Ordering::Relaxed) {
            return Err(DiffError::Cancelled);
        }
        let bytes = jar.slice(entry.offset, entry.size)?;
        self.reader
            .read_node(bytes)
            .map_err(|source| DiffError::NodeDecode {
                artifact: jar.path().to_path_buf(),
                path_hash: hash,
                source,
            })
    }
}
