//! Embedded SPIR-V shader chunk payloads.
//!
//! A shader payload is a count header, one descriptor per shader, then all
//! SPIR-V blobs concatenated in descriptor order. Each blob must start
//! with the SPIR-V magic word and be a multiple of 4 bytes.

use taf_common::{BinaryReader, BinaryWriter};

use crate::header::SPIRV_MAGIC;
use crate::{Error, Result};

/// Serialized size of the shader payload header in bytes.
pub const SHADER_HEADER_SIZE: usize = 16;

/// Serialized size of one [`ShaderDescriptor`] in bytes.
pub const SHADER_DESCRIPTOR_SIZE: usize = 60;

/// Pipeline stage a shader module belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShaderStage {
    #[default]
    Vertex = 0,
    Fragment = 1,
    Geometry = 2,
    Compute = 3,
    MeshShader = 4,
    TaskShader = 5,
}

impl ShaderStage {
    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Vertex),
            1 => Ok(Self::Fragment),
            2 => Ok(Self::Geometry),
            3 => Ok(Self::Compute),
            4 => Ok(Self::MeshShader),
            5 => Ok(Self::TaskShader),
            other => Err(Error::Validation(format!("unknown shader stage {other}"))),
        }
    }
}

/// Descriptor for one embedded shader module.
#[derive(Debug, Clone, Default)]
pub struct ShaderDescriptor {
    pub name_hash: u64,
    pub entry_point_hash: u64,
    pub stage: ShaderStage,
    pub spirv_size: u32,
    /// Mesh-shader output caps; zero for other stages.
    pub max_vertices: u32,
    pub max_primitives: u32,
    pub workgroup_size: [u32; 3],
}

impl ShaderDescriptor {
    fn write(&self, writer: &mut BinaryWriter) {
        writer.put_u64(self.name_hash);
        writer.put_u64(self.entry_point_hash);
        writer.put_u32(self.stage as u32);
        writer.put_u32(self.spirv_size);
        writer.put_u32(self.max_vertices);
        writer.put_u32(self.max_primitives);
        for ws in self.workgroup_size {
            writer.put_u32(ws);
        }
        writer.put_zeros(4 * 4); // reserved
    }

    fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let descriptor = Self {
            name_hash: reader.read_u64()?,
            entry_point_hash: reader.read_u64()?,
            stage: ShaderStage::from_u32(reader.read_u32()?)?,
            spirv_size: reader.read_u32()?,
            max_vertices: reader.read_u32()?,
            max_primitives: reader.read_u32()?,
            workgroup_size: [
                reader.read_u32()?,
                reader.read_u32()?,
                reader.read_u32()?,
            ],
        };
        reader.advance(4 * 4);
        Ok(descriptor)
    }
}

/// One shader to embed: descriptor metadata plus its SPIR-V bytes.
#[derive(Debug, Clone)]
pub struct ShaderEntry {
    pub descriptor: ShaderDescriptor,
    pub spirv: Vec<u8>,
}

/// Sanity-check a SPIR-V blob: magic word and word-aligned size.
pub fn validate_spirv(spirv: &[u8]) -> Result<()> {
    if spirv.len() % 4 != 0 {
        return Err(Error::Validation(format!(
            "SPIR-V size {} is not a multiple of 4",
            spirv.len()
        )));
    }
    if spirv.len() < 4 {
        return Err(Error::Validation("SPIR-V blob is empty".into()));
    }
    let magic = u32::from_le_bytes([spirv[0], spirv[1], spirv[2], spirv[3]]);
    if magic != SPIRV_MAGIC {
        return Err(Error::Validation(format!(
            "SPIR-V magic is 0x{magic:08X}, expected 0x{SPIRV_MAGIC:08X}"
        )));
    }
    Ok(())
}

/// Encode a shader payload from entries, validating each blob.
pub fn encode_payload(entries: &[ShaderEntry]) -> Result<Vec<u8>> {
    let blob_total: usize = entries.iter().map(|e| e.spirv.len()).sum();
    let mut writer = BinaryWriter::with_capacity(
        SHADER_HEADER_SIZE + entries.len() * SHADER_DESCRIPTOR_SIZE + blob_total,
    );

    writer.put_u32(entries.len() as u32);
    writer.put_zeros(3 * 4); // reserved

    for entry in entries {
        validate_spirv(&entry.spirv)?;
        let mut descriptor = entry.descriptor.clone();
        descriptor.spirv_size = entry.spirv.len() as u32;
        descriptor.write(&mut writer);
    }
    for entry in entries {
        writer.put_bytes(&entry.spirv);
    }
    Ok(writer.into_bytes())
}

/// Decode a shader payload into descriptors and blob slices.
///
/// The descriptor table must exactly account for the payload tail; a
/// mismatched layout is rejected with the observed signature so older
/// incompatible encodings fail loudly instead of misparsing.
pub fn decode_payload(payload: &[u8]) -> Result<Vec<(ShaderDescriptor, &[u8])>> {
    if payload.len() < SHADER_HEADER_SIZE {
        return Err(Error::Validation(format!(
            "shader payload too small: {} bytes",
            payload.len()
        )));
    }
    let mut reader = BinaryReader::new(payload);
    let count = reader.read_u32()? as usize;
    reader.advance(3 * 4);

    let table_end = SHADER_HEADER_SIZE + count * SHADER_DESCRIPTOR_SIZE;
    if payload.len() < table_end {
        return Err(Error::Validation(format!(
            "shader payload is {} bytes but the descriptor table needs {table_end}",
            payload.len()
        )));
    }

    let mut descriptors = Vec::with_capacity(count);
    let mut blob_total = 0usize;
    for _ in 0..count {
        let descriptor = ShaderDescriptor::read(&mut reader)?;
        blob_total += descriptor.spirv_size as usize;
        descriptors.push(descriptor);
    }

    if payload.len() != table_end + blob_total {
        return Err(Error::Validation(format!(
            "shader payload layout mismatch: {} shaders, {} blob bytes declared, \
             {} bytes after descriptor table",
            count,
            blob_total,
            payload.len() - table_end
        )));
    }

    let mut result = Vec::with_capacity(count);
    let mut offset = table_end;
    for descriptor in descriptors {
        let size = descriptor.spirv_size as usize;
        let blob = &payload[offset..offset + size];
        offset += size;
        result.push((descriptor, blob));
    }
    Ok(result)
}

/// Byte offset of a shader's blob within the payload, by descriptor index.
pub fn blob_offset(descriptors: &[ShaderDescriptor], index: usize) -> usize {
    let prior: usize = descriptors[..index]
        .iter()
        .map(|d| d.spirv_size as usize)
        .sum();
    SHADER_HEADER_SIZE + descriptors.len() * SHADER_DESCRIPTOR_SIZE + prior
}

/// A minimal valid SPIR-V module for tests and placeholder payloads:
/// magic, version 1.0, zero generator, bound 1, schema 0.
pub fn placeholder_spirv(words: usize) -> Vec<u8> {
    let mut spirv = Vec::with_capacity(words.max(5) * 4);
    for word in [SPIRV_MAGIC, 0x0001_0000, 0, 1, 0] {
        spirv.extend_from_slice(&word.to_le_bytes());
    }
    while spirv.len() < words * 4 {
        spirv.extend_from_slice(&0u32.to_le_bytes());
    }
    spirv
}

#[cfg(test)]
mod tests {
    use super::*;
    use taf_common::hash::shader_hashes;

    fn mesh_entry() -> ShaderEntry {
        ShaderEntry {
            descriptor: ShaderDescriptor {
                name_hash: shader_hashes::TRIANGLE_MESH,
                entry_point_hash: shader_hashes::MAIN_ENTRY,
                stage: ShaderStage::MeshShader,
                max_vertices: 3,
                max_primitives: 1,
                workgroup_size: [1, 1, 1],
                ..Default::default()
            },
            spirv: placeholder_spirv(16),
        }
    }

    fn frag_entry() -> ShaderEntry {
        ShaderEntry {
            descriptor: ShaderDescriptor {
                name_hash: shader_hashes::TRIANGLE_FRAG,
                entry_point_hash: shader_hashes::MAIN_ENTRY,
                stage: ShaderStage::Fragment,
                ..Default::default()
            },
            spirv: placeholder_spirv(8),
        }
    }

    #[test]
    fn payload_roundtrip() {
        let payload = encode_payload(&[mesh_entry(), frag_entry()]).unwrap();
        let decoded = decode_payload(&payload).unwrap();

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].0.name_hash, shader_hashes::TRIANGLE_MESH);
        assert_eq!(decoded[0].0.stage, ShaderStage::MeshShader);
        assert_eq!(decoded[0].0.spirv_size, 64);
        assert_eq!(decoded[1].0.spirv_size, 32);
        assert!(validate_spirv(decoded[0].1).is_ok());
        assert!(validate_spirv(decoded[1].1).is_ok());
    }

    #[test]
    fn first_blob_sits_after_descriptor_table() {
        let entries = [mesh_entry(), frag_entry()];
        let payload = encode_payload(&entries).unwrap();

        let offset = SHADER_HEADER_SIZE + 2 * SHADER_DESCRIPTOR_SIZE;
        let magic = u32::from_le_bytes(payload[offset..offset + 4].try_into().unwrap());
        assert_eq!(magic, SPIRV_MAGIC);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut entry = mesh_entry();
        entry.spirv[0] = 0;
        assert!(encode_payload(&[entry]).is_err());
    }

    #[test]
    fn misaligned_size_is_rejected() {
        let mut entry = mesh_entry();
        entry.spirv.push(0);
        assert!(encode_payload(&[entry]).is_err());
    }

    #[test]
    fn layout_mismatch_is_rejected_with_signature() {
        let mut payload = encode_payload(&[mesh_entry()]).unwrap();
        payload.extend_from_slice(&[0u8; 8]);
        let err = decode_payload(&payload).unwrap_err();
        assert!(err.to_string().contains("layout mismatch"));
    }

    #[test]
    fn blob_offsets_accumulate() {
        let entries = [mesh_entry(), frag_entry()];
        let payload = encode_payload(&entries).unwrap();
        let decoded = decode_payload(&payload).unwrap();
        let descriptors: Vec<ShaderDescriptor> =
            decoded.iter().map(|(d, _)| d.clone()).collect();

        assert_eq!(
            blob_offset(&descriptors, 0),
            SHADER_HEADER_SIZE + 2 * SHADER_DESCRIPTOR_SIZE
        );
        assert_eq!(
            blob_offset(&descriptors, 1),
            SHADER_HEADER_SIZE + 2 * SHADER_DESCRIPTOR_SIZE + 64
        );
    }
}
