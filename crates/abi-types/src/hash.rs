use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Domain tag for inner-entry path hashes.
const PATH_DOMAIN: &str = "abi-path-v1";
/// Domain tag for per-node content digests.
const NODE_DOMAIN: &str = "abi-node-v1";

/// BLAKE3 over `domain ":" data`.
///
/// The domain prefix keeps a path hash and a node digest over identical bytes
/// from colliding.
fn domain_hash(domain: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain.as_bytes());
    hasher.update(b":");
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Compact 64-bit hash of an archive entry path.
///
/// Node indexes key their entries by `PathHash` instead of by the path string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathHash(u64);

impl PathHash {
    /// Hash an inner archive path such as `com/example/Foo.class`.
    pub fn of(inner_path: &str) -> Self {
        let hash = domain_hash(PATH_DOMAIN, inner_path.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash[..8]);
        Self(u64::from_le_bytes(head))
    }

    /// Wrap a raw value read from an index blob.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for PathHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathHash({:016x})", self.0)
    }
}

impl fmt::Display for PathHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// 128-bit content fingerprint of a stored node record.
///
/// Two records with equal digests are treated as unchanged without decoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeDigest([u8; 16]);

impl NodeDigest {
    pub const LEN: usize = 16;

    /// Digest the raw bytes of a node record.
    pub fn of(record: &[u8]) -> Self {
        let hash = domain_hash(NODE_DOMAIN, record);
        let mut digest = [0u8; 16];
        digest.copy_from_slice(&hash[..16]);
        Self(digest)
    }

    pub const fn from_raw(raw: [u8; 16]) -> Self {
        Self(raw)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for NodeDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeDigest({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for NodeDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// BLAKE3 digest of a whole artifact file.
///
/// Identifies a previous artifact version in a [`DependencyDescriptor`](crate::DependencyDescriptor).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactDigest([u8; 32]);

impl ArtifactDigest {
    /// Digest artifact bytes held in memory.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Digest an artifact on disk.
    pub fn of_file(path: &Path) -> Result<Self, TypeError> {
        let data = std::fs::read(path).map_err(|e| TypeError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self::of_bytes(&data))
    }

    pub const fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for ArtifactDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArtifactDigest({})", self.short_hex())
    }
}

impl fmt::Display for ArtifactDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Opaque 64-bit identity of an artifact, supplied by the build orchestrator.
///
/// This crate never derives it implicitly; callers either pass their own value
/// or use [`FileIdentityHash::from_digest`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileIdentityHash(u64);

impl FileIdentityHash {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Fold an artifact digest down to its first eight bytes.
    pub fn from_digest(digest: &ArtifactDigest) -> Self {
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        Self(u64::from_le_bytes(head))
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for FileIdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileIdentityHash({:016x})", self.0)
    }
}

impl fmt::Display for FileIdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_hash_is_deterministic() {
        let a = PathHash::of("com/example/Foo.class");
        let b = PathHash::of("com/example/Foo.class");
        assert_eq!(a, b);
        assert_ne!(a, PathHash::of("com/example/Bar.class"));
    }

    #[test]
    fn path_hash_display_is_16_hex_digits() {
        let h = PathHash::from_raw(0xab);
        assert_eq!(h.to_string(), "00000000000000ab");
    }

    #[test]
    fn node_digest_is_domain_separated_from_path_hash() {
        let bytes = b"com/example/Foo.class";
        let digest = NodeDigest::of(bytes);
        let path = PathHash::of("com/example/Foo.class");
        assert_ne!(&digest.as_bytes()[..8], &path.as_u64().to_le_bytes());
    }

    #[test]
    fn node_digest_detects_single_byte_change() {
        assert_ne!(NodeDigest::of(b"abc"), NodeDigest::of(b"abd"));
    }

    #[test]
    fn artifact_digest_hex_roundtrip() {
        let d = ArtifactDigest::of_bytes(b"jar bytes");
        let parsed = ArtifactDigest::from_hex(&d.to_hex()).unwrap();
        assert_eq!(d, parsed);
        assert_eq!(d.short_hex().len(), 8);
    }

    #[test]
    fn artifact_digest_rejects_bad_hex() {
        assert!(matches!(
            ArtifactDigest::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
        assert!(matches!(
            ArtifactDigest::from_hex("abcd"),
            Err(TypeError::InvalidLength { expected: 32, actual: 2 })
        ));
    }

    #[test]
    fn artifact_digest_of_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.abijar");
        std::fs::write(&path, b"payload").unwrap();
        assert_eq!(
            ArtifactDigest::of_file(&path).unwrap(),
            ArtifactDigest::of_bytes(b"payload")
        );
    }

    #[test]
    fn artifact_digest_of_missing_file_errors() {
        let err = ArtifactDigest::of_file(Path::new("/nonexistent/lib.abijar")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/lib.abijar"));
    }

    #[test]
    fn file_identity_from_digest_uses_leading_bytes() {
        let d = ArtifactDigest::from_hash([1; 32]);
        assert_eq!(
            FileIdentityHash::from_digest(&d).as_u64(),
            u64::from_le_bytes([1; 8])
        );
    }

    #[test]
    fn serde_roundtrip() {
        let d = ArtifactDigest::of_bytes(b"serde test");
        let json = serde_json::to_string(&d).unwrap();
        let parsed: ArtifactDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(d, parsed);
    }
}
