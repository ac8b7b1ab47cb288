//! The TAF asset container.
//!
//! An [`Asset`] maps chunk-type tags to payload byte vectors, with a fixed
//! header and a directory that carries per-chunk sizes and CRC32 checksums.
//! Offsets are computed only at save time; a directory entry's offset is
//! zero between `add_chunk` and `save_to_file`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use rustc_hash::FxHashMap;
use taf_common::crc;

use crate::chunks::shader::{SHADER_DESCRIPTOR_SIZE, SHADER_HEADER_SIZE};
use crate::directory::{ChunkDirectoryEntry, DIRECTORY_ENTRY_SIZE};
use crate::header::{AssetHeader, ChunkType, FeatureFlags, Vec3Q, HEADER_SIZE, SPIRV_MAGIC};
use crate::{Error, Result};

/// A chunked, CRC-verified interactive asset.
///
/// At most one payload exists per chunk-type tag. The directory preserves
/// insertion order, which is also the payload order in the saved file.
#[derive(Debug, Clone)]
pub struct Asset {
    header: AssetHeader,
    directory: Vec<ChunkDirectoryEntry>,
    chunk_data: FxHashMap<u32, Vec<u8>>,
}

impl Default for Asset {
    fn default() -> Self {
        Self::new()
    }
}

impl Asset {
    /// Create an empty master asset with version 1.0.0 and no features.
    pub fn new() -> Self {
        Self {
            header: AssetHeader::default(),
            directory: Vec::new(),
            chunk_data: FxHashMap::default(),
        }
    }

    /// Borrow the header.
    pub fn header(&self) -> &AssetHeader {
        &self.header
    }

    /// Borrow the chunk directory in insertion order.
    pub fn directory(&self) -> &[ChunkDirectoryEntry] {
        &self.directory
    }

    pub fn set_creator(&mut self, creator: &str) {
        self.header.creator = truncate_str(creator, 63);
    }

    pub fn set_description(&mut self, description: &str) {
        self.header.description = truncate_str(description, 127);
    }

    pub fn creator(&self) -> &str {
        &self.header.creator
    }

    pub fn description(&self) -> &str {
        &self.header.description
    }

    pub fn set_feature_flags(&mut self, flags: FeatureFlags) {
        self.header.feature_flags = flags;
    }

    pub fn feature_flags(&self) -> FeatureFlags {
        self.header.feature_flags
    }

    /// Exact-mask feature membership.
    pub fn has_feature(&self, flag: FeatureFlags) -> bool {
        self.header.feature_flags.contains(flag)
    }

    pub fn set_world_bounds(&mut self, min: Vec3Q, max: Vec3Q) {
        self.header.world_bounds_min = min;
        self.header.world_bounds_max = max;
    }

    pub fn set_created_timestamp(&mut self, timestamp: u64) {
        self.header.created_timestamp = timestamp;
    }

    /// Store a payload under `tag`, replacing any prior payload with the
    /// same tag. The directory entry records the payload size and CRC32;
    /// its offset stays zero until save.
    pub fn add_chunk(&mut self, tag: ChunkType, data: Vec<u8>, name: &str) {
        log::debug!("adding chunk {name} ({tag}, {} bytes)", data.len());

        let entry = ChunkDirectoryEntry::for_payload(tag, &data, name);
        let key = tag.as_u32();

        if self.chunk_data.insert(key, data).is_some() {
            // Same tag again: replace the directory entry in place so the
            // chunk keeps its position in the file layout.
            if let Some(existing) = self
                .directory
                .iter_mut()
                .find(|e| e.chunk_type.as_u32() == key)
            {
                *existing = entry;
            }
        } else {
            self.directory.push(entry);
        }
        self.header.chunk_count = self.directory.len() as u32;
    }

    pub fn has_chunk(&self, tag: ChunkType) -> bool {
        self.chunk_data.contains_key(&tag.as_u32())
    }

    /// Remove a chunk and its directory entry. Returns false if absent.
    pub fn remove_chunk(&mut self, tag: ChunkType) -> bool {
        let key = tag.as_u32();
        if self.chunk_data.remove(&key).is_none() {
            return false;
        }
        self.directory.retain(|e| e.chunk_type.as_u32() != key);
        self.header.chunk_count = self.directory.len() as u32;
        true
    }

    pub fn get_chunk_data(&self, tag: ChunkType) -> Option<&[u8]> {
        self.chunk_data.get(&tag.as_u32()).map(Vec::as_slice)
    }

    /// Tags present in the asset, in directory order.
    pub fn get_chunk_types(&self) -> Vec<ChunkType> {
        self.directory.iter().map(|e| e.chunk_type).collect()
    }

    pub fn get_chunk_count(&self) -> usize {
        self.directory.len()
    }

    /// Total serialized size: header + directory + payloads.
    pub fn get_file_size(&self) -> u64 {
        let mut size = (HEADER_SIZE + self.directory.len() * DIRECTORY_ENTRY_SIZE) as u64;
        for data in self.chunk_data.values() {
            size += data.len() as u64;
        }
        size
    }

    /// Serialize the asset to a file.
    ///
    /// Lays out offsets, writes header, directory and payloads in
    /// directory order, and verifies the stream position after each write.
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        log::info!("saving asset to {}", path.display());

        if self.header.chunk_count as usize != self.directory.len()
            || self.header.chunk_count as usize != self.chunk_data.len()
        {
            return Err(Error::Integrity(format!(
                "chunk count mismatch: header={}, directory={}, payloads={}",
                self.header.chunk_count,
                self.directory.len(),
                self.chunk_data.len()
            )));
        }

        // Assign offsets: payloads follow the directory contiguously.
        let data_start = (HEADER_SIZE + self.directory.len() * DIRECTORY_ENTRY_SIZE) as u64;
        let mut current_offset = data_start;
        for entry in &mut self.directory {
            entry.offset = current_offset;
            current_offset += entry.size;
        }
        self.header.total_size = current_offset;

        let mut file = File::create(path)?;

        file.write_all(&self.header.encode())
            .map_err(|e| Error::Write(format!("failed to write header: {e}")))?;

        for entry in &self.directory {
            file.write_all(&entry.encode())
                .map_err(|e| Error::Write(format!("failed to write entry {:?}: {e}", entry.name)))?;
        }

        let expected_dir_end = data_start;
        let pos = file.stream_position()?;
        if pos != expected_dir_end {
            return Err(Error::Write(format!(
                "offset drift after directory: expected {expected_dir_end}, at {pos}"
            )));
        }

        for entry in &self.directory {
            let data = self
                .chunk_data
                .get(&entry.chunk_type.as_u32())
                .ok_or_else(|| {
                    Error::Integrity(format!("payload missing for chunk {:?}", entry.name))
                })?;

            let pos = file.stream_position()?;
            if pos != entry.offset {
                return Err(Error::Write(format!(
                    "offset drift for chunk {:?}: expected {}, at {pos}",
                    entry.name, entry.offset
                )));
            }

            file.write_all(data)
                .map_err(|e| Error::Write(format!("failed to write chunk {:?}: {e}", entry.name)))?;

            if entry.chunk_type == ChunkType::Shader {
                check_spirv_magic(&entry.name, data);
            }
        }

        file.flush()?;
        log::info!(
            "asset saved: {} bytes, {} chunks",
            self.header.total_size,
            self.header.chunk_count
        );
        Ok(())
    }

    /// Load an asset from a file, validating the header, directory bounds
    /// and every payload's CRC32.
    ///
    /// Any failure invalidates the whole load; no partial payloads are
    /// returned.
    pub fn load_from_file_safe<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::info!("loading asset from {}", path.display());

        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE as u64 {
            return Err(Error::Validation(format!(
                "file too small for header: {file_size} bytes (need {HEADER_SIZE})"
            )));
        }

        let mut header_bytes = vec![0u8; HEADER_SIZE];
        file.read_exact(&mut header_bytes)
            .map_err(|e| Error::Read(format!("failed to read header: {e}")))?;

        let header = AssetHeader::decode(&header_bytes)?;
        header.validate(file_size, &header_bytes)?;

        let mut directory = Vec::with_capacity(header.chunk_count as usize);
        let mut entry_bytes = vec![0u8; DIRECTORY_ENTRY_SIZE];
        for i in 0..header.chunk_count {
            file.read_exact(&mut entry_bytes)
                .map_err(|e| Error::Read(format!("failed to read directory entry {i}: {e}")))?;
            let entry = ChunkDirectoryEntry::decode(&entry_bytes)?;

            if entry.offset >= file_size || entry.offset + entry.size > file_size {
                return Err(Error::Validation(format!(
                    "chunk {} ({:?}) extends beyond file: offset={}, size={}, file size={}",
                    i, entry.name, entry.offset, entry.size, file_size
                )));
            }
            directory.push(entry);
        }

        let mut chunk_data = FxHashMap::default();
        for entry in &directory {
            file.seek(SeekFrom::Start(entry.offset))
                .map_err(|e| Error::Read(format!("failed to seek to chunk {:?}: {e}", entry.name)))?;

            let mut data = vec![0u8; entry.size as usize];
            file.read_exact(&mut data).map_err(|e| {
                Error::Read(format!(
                    "short read for chunk {:?} at offset {}: {e}",
                    entry.name, entry.offset
                ))
            })?;

            let actual = crc::hash_bytes(&data);
            if actual != entry.checksum {
                return Err(Error::Checksum {
                    name: entry.name.clone(),
                    expected: entry.checksum,
                    actual,
                });
            }

            chunk_data.insert(entry.chunk_type.as_u32(), data);
            log::debug!("loaded chunk {} ({} bytes)", entry.name, entry.size);
        }

        Ok(Self {
            header,
            directory,
            chunk_data,
        })
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Creator:     {}", self.header.creator)?;
        writeln!(f, "Description: {}", self.header.description)?;
        writeln!(
            f,
            "Version:     {}.{}.{}",
            self.header.version_major, self.header.version_minor, self.header.version_patch
        )?;
        writeln!(
            f,
            "Type:        {}",
            if self.header.asset_type == 0 {
                "Master Asset"
            } else {
                "Overlay"
            }
        )?;
        writeln!(f, "Total size:  {} bytes", self.header.total_size)?;
        writeln!(f, "Features:    0x{:016X}", self.header.feature_flags.bits())?;
        writeln!(f, "Chunks:      {}", self.header.chunk_count)?;
        for entry in &self.directory {
            writeln!(
                f,
                "  {} {:<31} {:>10} bytes  crc 0x{:08X}",
                entry.chunk_type, entry.name, entry.size, entry.checksum
            )?;
        }
        Ok(())
    }
}

fn truncate_str(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Log whether a shader payload's first SPIR-V blob starts with the
/// expected magic word. Diagnostic only; an invalid magic never fails the
/// save.
fn check_spirv_magic(name: &str, data: &[u8]) {
    let blob_offset = SHADER_HEADER_SIZE + 2 * SHADER_DESCRIPTOR_SIZE;
    if blob_offset + 4 > data.len() {
        return;
    }
    let word = u32::from_le_bytes([
        data[blob_offset],
        data[blob_offset + 1],
        data[blob_offset + 2],
        data[blob_offset + 3],
    ]);
    if word == SPIRV_MAGIC {
        log::debug!("chunk {name}: SPIR-V magic valid at offset {blob_offset}");
    } else {
        log::warn!(
            "chunk {name}: word at offset {blob_offset} is 0x{word:08X}, expected 0x{SPIRV_MAGIC:08X}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
        dir.path().join(name)
    }

    #[test]
    fn empty_asset_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "empty.taf");

        let mut asset = Asset::new();
        asset.set_creator("Taffy");
        asset.set_description("test");
        asset.save_to_file(&path).unwrap();

        let on_disk = std::fs::metadata(&path).unwrap().len();
        assert_eq!(on_disk, HEADER_SIZE as u64);

        let loaded = Asset::load_from_file_safe(&path).unwrap();
        assert_eq!(loaded.creator(), "Taffy");
        assert_eq!(loaded.description(), "test");
        assert_eq!(loaded.get_chunk_count(), 0);
    }

    #[test]
    fn chunk_roundtrip_preserves_bytes_and_crc() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "chunked.taf");

        let payload: Vec<u8> = (0..=255).cycle().take(1000).collect();
        let expected_crc = crc::hash_bytes(&payload);

        let mut asset = Asset::new();
        asset.add_chunk(ChunkType::Geometry, payload.clone(), "geometry");
        assert_eq!(asset.directory()[0].checksum, expected_crc);
        assert_eq!(asset.directory()[0].offset, 0);

        asset.save_to_file(&path).unwrap();

        let loaded = Asset::load_from_file_safe(&path).unwrap();
        assert_eq!(loaded.get_chunk_data(ChunkType::Geometry), Some(&payload[..]));
        assert_eq!(loaded.directory()[0].checksum, expected_crc);
    }

    #[test]
    fn layout_is_monotone_and_size_equation_holds() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "layout.taf");

        let mut asset = Asset::new();
        asset.add_chunk(ChunkType::Geometry, vec![1u8; 100], "a");
        asset.add_chunk(ChunkType::Material, vec![2u8; 50], "b");
        asset.add_chunk(ChunkType::Audio, vec![3u8; 75], "c");
        asset.save_to_file(&path).unwrap();

        let data_start = (HEADER_SIZE + 3 * DIRECTORY_ENTRY_SIZE) as u64;
        let dir_entries = asset.directory();
        assert_eq!(dir_entries[0].offset, data_start);
        assert_eq!(dir_entries[1].offset, data_start + 100);
        assert_eq!(dir_entries[2].offset, data_start + 150);
        assert_eq!(asset.header().total_size, data_start + 225);
        assert_eq!(asset.get_file_size(), asset.header().total_size);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            asset.header().total_size
        );
    }

    #[test]
    fn same_tag_overwrites_in_place() {
        let mut asset = Asset::new();
        asset.add_chunk(ChunkType::Geometry, vec![1u8; 10], "first");
        asset.add_chunk(ChunkType::Material, vec![2u8; 10], "material");
        asset.add_chunk(ChunkType::Geometry, vec![3u8; 20], "second");

        assert_eq!(asset.get_chunk_count(), 2);
        assert_eq!(asset.directory()[0].name, "second");
        assert_eq!(asset.directory()[0].size, 20);
        assert_eq!(asset.get_chunk_data(ChunkType::Geometry).unwrap()[0], 3);
    }

    #[test]
    fn remove_chunk_resyncs_count() {
        let mut asset = Asset::new();
        asset.add_chunk(ChunkType::Geometry, vec![0u8; 4], "g");
        asset.add_chunk(ChunkType::Audio, vec![0u8; 4], "a");
        assert!(asset.remove_chunk(ChunkType::Geometry));
        assert!(!asset.remove_chunk(ChunkType::Geometry));
        assert_eq!(asset.get_chunk_count(), 1);
        assert_eq!(asset.header().chunk_count, 1);
        assert_eq!(asset.get_chunk_types(), vec![ChunkType::Audio]);
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "corrupt.taf");

        let mut asset = Asset::new();
        asset.add_chunk(ChunkType::Geometry, vec![7u8; 64], "geometry");
        asset.save_to_file(&path).unwrap();

        // Flip one payload byte.
        let mut bytes = std::fs::read(&path).unwrap();
        let payload_offset = HEADER_SIZE + DIRECTORY_ENTRY_SIZE;
        bytes[payload_offset] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let err = Asset::load_from_file_safe(&path).unwrap_err();
        assert!(matches!(err, Error::Checksum { .. }));
    }

    #[test]
    fn truncated_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "truncated.taf");

        let mut asset = Asset::new();
        asset.add_chunk(ChunkType::Geometry, vec![7u8; 64], "geometry");
        asset.save_to_file(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();

        let err = Asset::load_from_file_safe(&path).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn garbage_magic_fails_with_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "garbage.taf");

        let mut asset = Asset::new();
        asset.save_to_file(&path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[..4].copy_from_slice(b"WXYZ");
        std::fs::write(&path, &bytes).unwrap();

        let err = Asset::load_from_file_safe(&path).unwrap_err();
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn clone_is_deep() {
        let mut asset = Asset::new();
        asset.add_chunk(ChunkType::Geometry, vec![1u8; 8], "g");
        let mut copy = asset.clone();
        copy.add_chunk(ChunkType::Geometry, vec![2u8; 8], "g2");

        assert_eq!(asset.get_chunk_data(ChunkType::Geometry).unwrap()[0], 1);
        assert_eq!(copy.get_chunk_data(ChunkType::Geometry).unwrap()[0], 2);
    }

    #[test]
    fn full_asset_roundtrip_preserves_everything_but_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "full.taf");

        let mut asset = Asset::new();
        asset.set_creator("Taffy");
        asset.set_description("multi-chunk asset");
        asset.set_feature_flags(
            FeatureFlags::QUANTIZED_COORDS
                | FeatureFlags::HASH_BASED_NAMES
                | FeatureFlags::AUDIO,
        );
        asset.set_world_bounds(Vec3Q::new(-128_000, -1, 0), Vec3Q::new(128_000, 1, 0));
        asset.set_created_timestamp(1_700_000_000);
        asset.add_chunk(ChunkType::Geometry, vec![1u8; 300], "geometry");
        asset.add_chunk(ChunkType::Material, vec![2u8; 164], "material");
        asset.add_chunk(ChunkType::Audio, vec![3u8; 336], "audio");
        asset.save_to_file(&path).unwrap();

        let loaded = Asset::load_from_file_safe(&path).unwrap();
        assert_eq!(loaded.creator(), asset.creator());
        assert_eq!(loaded.description(), asset.description());
        assert_eq!(loaded.feature_flags(), asset.feature_flags());
        assert_eq!(
            loaded.header().world_bounds_min,
            asset.header().world_bounds_min
        );
        assert_eq!(loaded.header().created_timestamp, 1_700_000_000);
        assert_eq!(loaded.get_chunk_types(), asset.get_chunk_types());
        for (ours, theirs) in asset.directory().iter().zip(loaded.directory()) {
            assert_eq!(ours.chunk_type, theirs.chunk_type);
            assert_eq!(ours.size, theirs.size);
            assert_eq!(ours.checksum, theirs.checksum);
            assert_eq!(ours.name, theirs.name);
        }
        for tag in asset.get_chunk_types() {
            assert_eq!(asset.get_chunk_data(tag), loaded.get_chunk_data(tag));
        }
    }

    #[test]
    fn creator_truncates_at_63_bytes() {
        let mut asset = Asset::new();
        asset.set_creator(&"x".repeat(100));
        assert_eq!(asset.creator().len(), 63);
        asset.set_description(&"y".repeat(200));
        assert_eq!(asset.description().len(), 127);
    }
}
