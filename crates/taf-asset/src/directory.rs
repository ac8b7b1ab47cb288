//! Chunk directory entries.

use taf_common::{crc, BinaryReader, BinaryWriter};

use crate::header::ChunkType;
use crate::Result;

/// Serialized size of a [`ChunkDirectoryEntry`] in bytes.
pub const DIRECTORY_ENTRY_SIZE: usize = 76;

/// One entry in the chunk directory that follows the asset header.
///
/// `offset` is zero between `add_chunk` and `save_to_file`; final offsets
/// are assigned only when the file is laid out.
#[derive(Debug, Clone)]
pub struct ChunkDirectoryEntry {
    pub chunk_type: ChunkType,
    pub flags: u32,
    /// Offset from the start of the file, assigned at save time.
    pub offset: u64,
    /// Exact payload size in bytes.
    pub size: u64,
    /// CRC32 over the payload bytes.
    pub checksum: u32,
    /// Debug name, at most 31 bytes on disk.
    pub name: String,
}

impl ChunkDirectoryEntry {
    /// Build an entry for a payload, computing size and checksum.
    pub fn for_payload(chunk_type: ChunkType, data: &[u8], name: &str) -> Self {
        Self {
            chunk_type,
            flags: 0,
            offset: 0,
            size: data.len() as u64,
            checksum: crc::hash_bytes(data),
            name: name.to_string(),
        }
    }

    /// Serialize into the 76-byte on-disk form.
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(DIRECTORY_ENTRY_SIZE);
        writer.put_u32(self.chunk_type.as_u32());
        writer.put_u32(self.flags);
        writer.put_u64(self.offset);
        writer.put_u64(self.size);
        writer.put_u32(self.checksum);
        writer.put_fixed_str(&self.name, 32);
        writer.put_zeros(4 * 4); // reserved
        debug_assert_eq!(writer.len(), DIRECTORY_ENTRY_SIZE);
        writer.into_bytes()
    }

    /// Parse an entry from bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);
        let entry = Self {
            chunk_type: ChunkType::from_u32(reader.read_u32()?),
            flags: reader.read_u32()?,
            offset: reader.read_u64()?,
            size: reader.read_u64()?,
            checksum: reader.read_u32()?,
            name: reader.read_string_in_buffer(32)?,
        };
        reader.advance(4 * 4);
        Ok(entry)
    }
}
