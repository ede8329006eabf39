//! ABI artifact container.
//!
//! An artifact bundles the node records of one build output together with an
//! embedded node index, laid out for random access:
//!
//! - **Header**: magic `ABIJ` + container version
//! - **Data region**: uncompressed entry bytes (node records, resources)
//! - **Directory**: name, offset, size and CRC32 for every entry
//! - **Trailer**: directory offset, entry count, magic `ABIE`
//!
//! The node index ([`NODE_INDEX_FILENAME`]) maps each [`abi_types::PathHash`] to
//! the record's absolute offset, size and digest, so a reader can skip
//! unchanged records without touching their bytes.
//!
//! - [`AbiJarWriter`] builds artifacts
//! - [`AbiJar`] opens a memory-mapped, read-only snapshot
//! - [`NodeIndex`] decodes the embedded index

pub mod entry;
pub mod error;
pub mod index;
pub mod reader;
pub mod writer;

pub use entry::DirectoryEntry;
pub use error::{JarError, JarResult};
pub use index::{NodeIndex, NodeIndexEntry, NODE_INDEX_FILENAME};
pub use reader::AbiJar;
pub use writer::AbiJarWriter;

#[cfg(test)]
mod tests {
    use super::*;
    use abi_node::{read_node, ClassNode, MemberSignature, ACC_PUBLIC};
    use abi_types::PathHash;

    fn sample_writer() -> AbiJarWriter {
        let mut writer = AbiJarWriter::new();
        writer
            .add_node(
                "com/example/Foo.class",
                &ClassNode::new("com/example/Foo")
                    .with_method(MemberSignature::new("foo", "()V", ACC_PUBLIC)),
            )
            .unwrap();
        writer
            .add_node("com/example/Bar.class", &ClassNode::new("com/example/Bar"))
            .unwrap();
        writer
            .add_entry("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n")
            .unwrap();
        writer
    }

    #[test]
    fn write_then_open_in_memory() {
        let bytes = sample_writer().finish_to_bytes().unwrap();
        let jar = AbiJar::from_bytes("mem.abijar", bytes).unwrap();
        assert_eq!(jar.entry_count(), 4);
        assert!(jar.contains(NODE_INDEX_FILENAME));
        assert_eq!(
            jar.entry("META-INF/MANIFEST.MF").unwrap().unwrap(),
            b"Manifest-Version: 1.0\n"
        );
        assert!(jar.entry("missing").unwrap().is_none());
    }

    #[test]
    fn index_offsets_address_node_records() {
        let bytes = sample_writer().finish_to_bytes().unwrap();
        let jar = AbiJar::from_bytes("mem.abijar", bytes).unwrap();
        let index = jar.read_node_index().unwrap();
        assert_eq!(index.len(), 2);

        let entry = index.get(&PathHash::of("com/example/Foo.class")).unwrap();
        let record = jar.slice(entry.offset, entry.size).unwrap();
        let node = read_node(record).unwrap();
        assert_eq!(node.name, "com/example/Foo");
        assert_eq!(node.methods.len(), 1);
    }

    #[test]
    fn disk_roundtrip_uses_mmap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.abijar");
        sample_writer().finish(&path).unwrap();

        let jar = AbiJar::open(&path).unwrap();
        assert_eq!(jar.path(), path.as_path());
        let index = jar.read_node_index().unwrap();
        assert!(index.contains(&PathHash::of("com/example/Bar.class")));
        let mut names: Vec<_> = jar.entry_names().collect();
        names.sort();
        assert_eq!(names[0], "META-INF/MANIFEST.MF");
    }

    #[test]
    fn missing_index_names_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noindex.abijar");
        let mut writer = AbiJarWriter::new().without_index();
        writer.add_node("A.class", &ClassNode::new("A")).unwrap();
        writer.finish(&path).unwrap();

        let jar = AbiJar::open(&path).unwrap();
        assert!(jar.index_blob().unwrap().is_none());
        let err = jar.read_node_index().unwrap_err();
        assert!(matches!(err, JarError::MissingNodeIndex { .. }));
        let msg = err.to_string();
        assert!(msg.contains("cannot find node index in artifact"));
        assert!(msg.contains("noindex.abijar"));
    }

    #[test]
    fn slice_out_of_range_is_truncated() {
        let bytes = sample_writer().finish_to_bytes().unwrap();
        let len = bytes.len() as u64;
        let jar = AbiJar::from_bytes("mem.abijar", bytes).unwrap();
        assert!(matches!(
            jar.slice(len - 2, 4),
            Err(JarError::Truncated { .. })
        ));
        assert!(matches!(
            jar.slice(u64::MAX, 1),
            Err(JarError::Truncated { .. })
        ));
        assert_eq!(jar.slice(len, 0).unwrap().len(), 0);
    }

    #[test]
    fn corrupted_index_fails_crc() {
        let mut bytes = sample_writer().finish_to_bytes().unwrap();
        let jar = AbiJar::from_bytes("mem.abijar", bytes.clone()).unwrap();
        let entry = *jar
            .read_node_index()
            .unwrap()
            .get(&PathHash::of("com/example/Foo.class"))
            .unwrap();
        let blob_len = jar.index_blob().unwrap().unwrap().len();
        drop(jar);

        // The index blob is the last entry, directly before the directory.
        let trailer = bytes.len() - 16;
        let mut dir_offset = [0u8; 8];
        dir_offset.copy_from_slice(&bytes[trailer..trailer + 8]);
        let blob_start = u64::from_le_bytes(dir_offset) as usize - blob_len;
        bytes[blob_start + 13] ^= 0xff;

        let jar = AbiJar::from_bytes("mem.abijar", bytes).unwrap();
        assert!(matches!(
            jar.read_node_index(),
            Err(JarError::CrcMismatch { .. })
        ));
        // Node records are addressed by slice and not CRC-checked.
        assert!(jar.slice(entry.offset, entry.size).is_ok());
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = sample_writer().finish_to_bytes().unwrap();
        bytes[0..4].copy_from_slice(b"PK\x03\x04");
        let err = AbiJar::from_bytes("zip.jar", bytes).unwrap_err();
        assert!(matches!(err, JarError::NotAnArtifact { .. }));
    }

    #[test]
    fn bad_container_version_rejected() {
        let mut bytes = sample_writer().finish_to_bytes().unwrap();
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        let err = AbiJar::from_bytes("new.abijar", bytes).unwrap_err();
        assert!(matches!(err, JarError::UnsupportedVersion { version: 2, .. }));
    }

    #[test]
    fn truncated_file_rejected() {
        let bytes = sample_writer().finish_to_bytes().unwrap();
        let cut = bytes[..bytes.len() - 5].to_vec();
        assert!(matches!(
            AbiJar::from_bytes("cut.abijar", cut),
            Err(JarError::CorruptDirectory { .. })
        ));
        assert!(matches!(
            AbiJar::from_bytes("tiny.abijar", b"ABIJ".to_vec()),
            Err(JarError::CorruptDirectory { .. })
        ));
    }

    #[test]
    fn open_empty_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.abijar");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(
            AbiJar::open(&path),
            Err(JarError::CorruptDirectory { .. })
        ));
    }

    #[test]
    fn open_missing_file_is_io_error() {
        let err = AbiJar::open(std::path::Path::new("/nonexistent/lib.abijar")).unwrap_err();
        assert!(matches!(err, JarError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/lib.abijar"));
    }

    #[test]
    fn invalid_index_blob_wraps_with_path() {
        // Valid container whose index entry holds garbage: build by hand.
        let mut writer = AbiJarWriter::new().without_index();
        writer.add_node("A.class", &ClassNode::new("A")).unwrap();
        let bytes = writer.finish_to_bytes().unwrap();
        let jar = AbiJar::from_bytes("ok.abijar", bytes).unwrap();
        assert!(matches!(
            jar.read_node_index(),
            Err(JarError::MissingNodeIndex { .. })
        ));

        let mut data = Vec::new();
        data.extend_from_slice(b"ABIJ");
        data.extend_from_slice(&1u32.to_le_bytes());
        let blob = b"ABNI\x09\x00\x00\x00\x00\x00\x00\x00";
        let offset = data.len() as u64;
        data.extend_from_slice(blob);
        let dir_offset = data.len() as u64;
        let dir = DirectoryEntry {
            name: NODE_INDEX_FILENAME.into(),
            offset,
            size: blob.len() as u32,
            crc32: crc32fast::hash(blob),
        };
        dir.encode(&mut data);
        data.extend_from_slice(&dir_offset.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(b"ABIE");

        let jar = AbiJar::from_bytes("v9.abijar", data).unwrap();
        let err = jar.read_node_index().unwrap_err();
        match &err {
            JarError::InvalidIndex { source, .. } => {
                assert!(matches!(**source, JarError::UnsupportedIndexVersion(9)))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("v9.abijar"));
    }
}
