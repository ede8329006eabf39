/// Magic bytes at the start of every artifact.
pub const ARTIFACT_MAGIC: &[u8; 4] = b"ABIJ";
/// Magic bytes closing the trailer.
pub const TRAILER_MAGIC: &[u8; 4] = b"ABIE";
/// Current container layout version.
pub const CONTAINER_VERSION: u32 = 1;

/// Header: magic + container version.
pub(crate) const HEADER_LEN: usize = 8;
/// Trailer: directory offset (u64) + entry count (u32) + magic.
pub(crate) const TRAILER_LEN: usize = 16;

/// Fixed part of a directory record after the name: offset, size, crc32.
const RECORD_TAIL_LEN: usize = 8 + 4 + 4;

/// One named entry in the artifact's central directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    /// Absolute byte offset of the entry data within the artifact.
    pub offset: u64,
    pub size: u32,
    /// CRC32 of the entry data.
    pub crc32: u32,
}

impl DirectoryEntry {
    /// Encode as `u16 name_len | name | u64 offset | u32 size | u32 crc32`.
    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        buf.extend_from_slice(self.name.as_bytes());
        buf.extend_from_slice(&self.offset.to_le_bytes());
        buf.extend_from_slice(&self.size.to_le_bytes());
        buf.extend_from_slice(&self.crc32.to_le_bytes());
    }

    /// Decode one record. Returns the entry and the bytes consumed.
    pub(crate) fn decode(data: &[u8]) -> Result<(Self, usize), String> {
        if data.len() < 2 {
            return Err("truncated name length".into());
        }
        let name_len = u16::from_le_bytes([data[0], data[1]]) as usize;
        let end = 2 + name_len + RECORD_TAIL_LEN;
        if data.len() < end {
            return Err("truncated directory record".into());
        }
        let name = std::str::from_utf8(&data[2..2 + name_len])
            .map_err(|e| format!("entry name is not UTF-8: {e}"))?
            .to_string();
        let tail = &data[2 + name_len..end];
        let offset = u64::from_le_bytes(le_array(&tail[0..8]));
        let size = u32::from_le_bytes(le_array(&tail[8..12]));
        let crc32 = u32::from_le_bytes(le_array(&tail[12..16]));
        Ok((
            Self {
                name,
                offset,
                size,
                crc32,
            },
            end,
        ))
    }

    /// End offset (exclusive) of the entry data.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size as u64)
    }
}

/// Copy a fixed-width slice into an array. Callers guarantee the length.
pub(crate) fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes[..N]);
    arr
}
