//! Locating previous artifact versions.
//!
//! A [`DependencyDescriptor`](abi_types::DependencyDescriptor) names the
//! previous version of an artifact only by digest. An [`ArtifactHistory`]
//! turns that digest back into a file the diff can open.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use abi_types::ArtifactDigest;
use tracing::debug;

use crate::error::{CacheError, CacheResult};

/// File extension of artifacts kept in a [`DirectoryHistory`].
pub const HISTORY_EXTENSION: &str = "abijar";

/// Resolves an artifact digest to the file holding that version.
pub trait ArtifactHistory: Send + Sync {
    /// `None` when the version is not available.
    fn resolve(&self, digest: &ArtifactDigest) -> Option<PathBuf>;
}

/// Fixed digest-to-path table, for callers that already know where old
/// versions live.
#[derive(Clone, Debug, Default)]
pub struct StaticHistory {
    paths: HashMap<ArtifactDigest, PathBuf>,
}

impl StaticHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, digest: ArtifactDigest, path: impl Into<PathBuf>) -> Self {
        self.insert(digest, path);
        self
    }

    pub fn insert(&mut self, digest: ArtifactDigest, path: impl Into<PathBuf>) {
        self.paths.insert(digest, path.into());
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl ArtifactHistory for StaticHistory {
    fn resolve(&self, digest: &ArtifactDigest) -> Option<PathBuf> {
        self.paths.get(digest).cloned()
    }
}

/// Content-addressed store of artifact versions.
///
/// Each version is stored at `<root>/<digest-hex>.abijar`. Files are written
/// once and never modified, so they are safe to memory-map while a diff runs.
#[derive(Clone, Debug)]
pub struct DirectoryHistory {
    root: PathBuf,
}

impl DirectoryHistory {
    /// Open (and create if needed) a history rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> CacheResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| CacheError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the version with `digest` is (or would be) stored.
    pub fn artifact_path(&self, digest: &ArtifactDigest) -> PathBuf {
        self.root
            .join(format!("{}.{HISTORY_EXTENSION}", digest.to_hex()))
    }

    /// Copy an artifact into the history and return its digest.
    ///
    /// Recording the same content twice is a no-op.
    pub fn record(&self, artifact: &Path) -> CacheResult<ArtifactDigest> {
        let bytes = std::fs::read(artifact).map_err(|e| CacheError::io(artifact, e))?;
        let digest = ArtifactDigest::of_bytes(&bytes);
        let target = self.artifact_path(&digest);
        if target.exists() {
            debug!(digest = %digest.short_hex(), "artifact already recorded");
            return Ok(digest);
        }

        // Write under a temporary name first so readers never see a partial file.
        let tmp = target.with_extension("tmp");
        std::fs::write(&tmp, &bytes).map_err(|e| CacheError::io(&tmp, e))?;
        std::fs::rename(&tmp, &target).map_err(|e| CacheError::io(&target, e))?;
        debug!(
            source = %artifact.display(),
            digest = %digest.short_hex(),
            bytes = bytes.len(),
            "artifact recorded"
        );
        Ok(digest)
    }

    /// Remove every stored version not in `live`. Returns the number removed.
    pub fn gc(&self, live: &[ArtifactDigest]) -> CacheResult<usize> {
        let live: Vec<String> = live.iter().map(ArtifactDigest::to_hex).collect();
        let entries = std::fs::read_dir(&self.root).map_err(|e| CacheError::io(&self.root, e))?;

        let mut removed = 0;
        for entry in entries {
            let path = entry.map_err(|e| CacheError::io(&self.root, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(HISTORY_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !live.iter().any(|hex| hex == stem) {
                std::fs::remove_file(&path).map_err(|e| CacheError::io(&path, e))?;
                removed += 1;
            }
        }
        debug!(root = %self.root.display(), removed, "history collected");
        Ok(removed)
    }
}

impl ArtifactHistory for DirectoryHistory {
    fn resolve(&self, digest: &ArtifactDigest) -> Option<PathBuf> {
        let path = self.artifact_path(digest);
        path.is_file().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_history_resolves_known_digests() {
        let known = ArtifactDigest::of_bytes(b"v1");
        let history = StaticHistory::new().with(known, "/builds/v1.abijar");
        assert_eq!(history.len(), 1);
        assert_eq!(
            history.resolve(&known),
            Some(PathBuf::from("/builds/v1.abijar"))
        );
        assert_eq!(history.resolve(&ArtifactDigest::of_bytes(b"v2")), None);
    }

    #[test]
    fn record_then_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let history = DirectoryHistory::open(dir.path().join("history")).unwrap();
        let artifact = dir.path().join("lib.abijar");
        std::fs::write(&artifact, b"artifact bytes").unwrap();

        let digest = history.record(&artifact).unwrap();
        assert_eq!(digest, ArtifactDigest::of_bytes(b"artifact bytes"));
        let stored = history.resolve(&digest).unwrap();
        assert_eq!(std::fs::read(&stored).unwrap(), b"artifact bytes");

        // The original may change afterwards; the recorded version does not.
        std::fs::write(&artifact, b"rebuilt").unwrap();
        assert_eq!(std::fs::read(history.resolve(&digest).unwrap()).unwrap(), b"artifact bytes");
    }

    #[test]
    fn record_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let history = DirectoryHistory::open(dir.path()).unwrap();
        let artifact = dir.path().join("a.bin");
        std::fs::write(&artifact, b"same").unwrap();
        let first = history.record(&artifact).unwrap();
        let second = history.record(&artifact).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn record_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let history = DirectoryHistory::open(dir.path()).unwrap();
        let err = history.record(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
    }

    #[test]
    fn unknown_digest_does_not_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let history = DirectoryHistory::open(dir.path()).unwrap();
        assert!(history.resolve(&ArtifactDigest::of_bytes(b"nope")).is_none());
    }

    #[test]
    fn gc_keeps_only_live_versions() {
        let dir = tempfile::tempdir().unwrap();
        let history = DirectoryHistory::open(dir.path().join("h")).unwrap();
        let mut digests = Vec::new();
        for content in [&b"one"[..], b"two", b"three"] {
            let path = dir.path().join("tmp.abijar");
            std::fs::write(&path, content).unwrap();
            digests.push(history.record(&path).unwrap());
        }
        std::fs::write(history.root().join("notes.txt"), b"keep me").unwrap();

        let removed = history.gc(&digests[..1]).unwrap();
        assert_eq!(removed, 2);
        assert!(history.resolve(&digests[0]).is_some());
        assert!(history.resolve(&digests[1]).is_none());
        assert!(history.root().join("notes.txt").exists());
    }
}
