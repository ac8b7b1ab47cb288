//! TAFO on-disk records: header, targets, operations and their data
//! payloads.

use taf_common::{BinaryReader, BinaryWriter};
use taf_asset::FeatureFlags;

use crate::{Error, Result};

/// Magic bytes for overlay files.
pub const TAFO_MAGIC: &[u8; 4] = b"TAFO";

/// Serialized size of [`OverlayHeader`] in bytes.
pub const OVERLAY_HEADER_SIZE: usize = 300;

/// Serialized size of one [`TargetAsset`] record in bytes.
pub const TARGET_ASSET_SIZE: usize = 316;

/// Serialized size of one [`OverlayOperation`] record in bytes.
pub const OVERLAY_OPERATION_SIZE: usize = 56;

/// Serialized size of one [`AttributeModification`] record in bytes.
pub const ATTRIBUTE_MODIFICATION_SIZE: usize = 32;

/// Serialized size of one [`TransformationData`] record in bytes.
pub const TRANSFORMATION_DATA_SIZE: usize = 76;

/// Serialized size of one [`SubsetModification`] record in bytes.
pub const SUBSET_MODIFICATION_SIZE: usize = 40;

/// Sentinel vertex index / count meaning "all vertices".
pub const ALL_VERTICES: u32 = u32::MAX;

/// Fixed header at the start of every TAFO file.
#[derive(Debug, Clone)]
pub struct OverlayHeader {
    pub magic: [u8; 4],
    pub version_major: u32,
    pub version_minor: u32,
    pub version_patch: u32,
    pub overlay_type: u32,
    /// Features the target asset must advertise.
    pub feature_flags: FeatureFlags,
    pub operation_count: u32,
    pub target_count: u32,
    pub total_size: u64,
    pub creator: String,
    pub description: String,
}

impl Default for OverlayHeader {
    fn default() -> Self {
        Self {
            magic: *TAFO_MAGIC,
            version_major: 1,
            version_minor: 0,
            version_patch: 0,
            overlay_type: 0,
            feature_flags: FeatureFlags::HASH_BASED_NAMES,
            operation_count: 0,
            target_count: 0,
            total_size: OVERLAY_HEADER_SIZE as u64,
            creator: "Hash-Based Overlay Creator".to_string(),
            description: "Taffy Overlay".to_string(),
        }
    }
}

impl OverlayHeader {
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(OVERLAY_HEADER_SIZE);
        writer.put_bytes(&self.magic);
        writer.put_u32(self.version_major);
        writer.put_u32(self.version_minor);
        writer.put_u32(self.version_patch);
        writer.put_u32(self.overlay_type);
        writer.put_u64(self.feature_flags.bits());
        writer.put_u32(self.operation_count);
        writer.put_u32(self.target_count);
        writer.put_u64(self.total_size);
        writer.put_fixed_str(&self.creator, 64);
        writer.put_fixed_str(&self.description, 128);
        writer.put_zeros(8 * 8); // reserved
        debug_assert_eq!(writer.len(), OVERLAY_HEADER_SIZE);
        writer.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);
        let magic: [u8; 4] = reader
            .read_bytes(4)?
            .try_into()
            .expect("read_bytes(4) returns 4 bytes");
        let header = Self {
            magic,
            version_major: reader.read_u32()?,
            version_minor: reader.read_u32()?,
            version_patch: reader.read_u32()?,
            overlay_type: reader.read_u32()?,
            feature_flags: FeatureFlags(reader.read_u64()?),
            operation_count: reader.read_u32()?,
            target_count: reader.read_u32()?,
            total_size: reader.read_u64()?,
            creator: reader.read_string_in_buffer(64)?,
            description: reader.read_string_in_buffer(128)?,
        };
        reader.advance(8 * 8);
        Ok(header)
    }

    /// Validate magic and declared size against the actual file size.
    pub fn validate(&self, file_size: u64, raw: &[u8]) -> Result<()> {
        let mut problems = Vec::new();
        if &self.magic != TAFO_MAGIC {
            problems.push(format!(
                "bad magic {:?} (expected {TAFO_MAGIC:?})",
                self.magic
            ));
        }
        if self.version_major > 100 || self.version_minor > 100 || self.version_patch > 1000 {
            problems.push(format!(
                "implausible version {}.{}.{}",
                self.version_major, self.version_minor, self.version_patch
            ));
        }
        if self.total_size != file_size {
            problems.push(format!(
                "declared size {} does not match file size {}",
                self.total_size, file_size
            ));
        }
        if problems.is_empty() {
            return Ok(());
        }
        let dump: Vec<String> = raw.iter().take(16).map(|b| format!("{b:02x}")).collect();
        Err(Error::Validation(format!(
            "{}; first 16 bytes: [{}]",
            problems.join("; "),
            dump.join(" ")
        )))
    }
}

/// A record describing which asset an overlay applies to.
#[derive(Debug, Clone)]
pub struct TargetAsset {
    pub asset_path: String,
    /// Zero until the overlay is applied; reserved for path-hash matching.
    pub asset_hash: u64,
    /// Semver requirement string such as `^1.0.0`.
    pub version_requirement: String,
    pub required_features: u32,
}

impl TargetAsset {
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(TARGET_ASSET_SIZE);
        writer.put_fixed_str(&self.asset_path, 256);
        writer.put_u64(self.asset_hash);
        writer.put_fixed_str(&self.version_requirement, 32);
        writer.put_u32(self.required_features);
        writer.put_zeros(4 * 4); // reserved
        debug_assert_eq!(writer.len(), TARGET_ASSET_SIZE);
        writer.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);
        let target = Self {
            asset_path: reader.read_string_in_buffer(256)?,
            asset_hash: reader.read_u64()?,
            version_requirement: reader.read_string_in_buffer(32)?,
            required_features: reader.read_u32()?,
        };
        reader.advance(4 * 4);
        Ok(target)
    }
}

/// The kind of mutation an operation performs. The numeric tags are part
/// of the file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    ChunkReplace,
    ShaderReplace,
    VertexColorChange,
    MaterialReplace,
    GeometryModify,
    VertexPositionChange,
    VertexAttributeChange,
    GeometryTransform,
    GeometryScale,
    GeometryRotate,
    GeometryTranslate,
    UvModification,
    NormalRecalculation,
    VertexSubset,
}

impl OperationType {
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::ChunkReplace => 0,
            Self::ShaderReplace => 1,
            Self::VertexColorChange => 2,
            Self::MaterialReplace => 3,
            Self::GeometryModify => 4,
            Self::VertexPositionChange => 5,
            Self::VertexAttributeChange => 6,
            Self::GeometryTransform => 7,
            Self::GeometryScale => 8,
            Self::GeometryRotate => 9,
            Self::GeometryTranslate => 10,
            Self::UvModification => 11,
            Self::NormalRecalculation => 12,
            Self::VertexSubset => 13,
        }
    }

    pub fn from_u32(value: u32) -> Result<Self> {
        Ok(match value {
            0 => Self::ChunkReplace,
            1 => Self::ShaderReplace,
            2 => Self::VertexColorChange,
            3 => Self::MaterialReplace,
            4 => Self::GeometryModify,
            5 => Self::VertexPositionChange,
            6 => Self::VertexAttributeChange,
            7 => Self::GeometryTransform,
            8 => Self::GeometryScale,
            9 => Self::GeometryRotate,
            10 => Self::GeometryTranslate,
            11 => Self::UvModification,
            12 => Self::NormalRecalculation,
            13 => Self::VertexSubset,
            other => {
                return Err(Error::Validation(format!(
                    "unknown overlay operation type {other}"
                )))
            }
        })
    }
}

/// A typed, data-parameterized mutation against a target chunk.
///
/// `target_hash` carries a name hash for shader operations, and is
/// reinterpreted as a vertex index for single-vertex geometry operations.
/// `(data_offset, data_size)` windows into the overlay's data blob.
#[derive(Debug, Clone)]
pub struct OverlayOperation {
    pub operation_type: OperationType,
    pub target_chunk_type: u32,
    pub target_hash: u64,
    pub replacement_hash: u64,
    pub data_offset: u64,
    pub data_size: u64,
    pub flags: u32,
}

impl OverlayOperation {
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(OVERLAY_OPERATION_SIZE);
        writer.put_u32(self.operation_type.as_u32());
        writer.put_u32(self.target_chunk_type);
        writer.put_u64(self.target_hash);
        writer.put_u64(self.replacement_hash);
        writer.put_u64(self.data_offset);
        writer.put_u64(self.data_size);
        writer.put_u32(self.flags);
        writer.put_zeros(3 * 4); // reserved
        debug_assert_eq!(writer.len(), OVERLAY_OPERATION_SIZE);
        writer.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);
        let op = Self {
            operation_type: OperationType::from_u32(reader.read_u32()?)?,
            target_chunk_type: reader.read_u32()?,
            target_hash: reader.read_u64()?,
            replacement_hash: reader.read_u64()?,
            data_offset: reader.read_u64()?,
            data_size: reader.read_u64()?,
            flags: reader.read_u32()?,
        };
        reader.advance(3 * 4);
        Ok(op)
    }

    /// Borrow this operation's window into the data blob.
    pub fn data<'a>(&self, blob: &'a [u8]) -> Result<&'a [u8]> {
        let start = self.data_offset as usize;
        let end = start
            .checked_add(self.data_size as usize)
            .ok_or_else(|| Error::Operation("operation data window overflows".into()))?;
        blob.get(start..end).ok_or_else(|| {
            Error::Operation(format!(
                "operation data window [{start}, {end}) exceeds blob size {}",
                blob.len()
            ))
        })
    }
}

/// How an [`AttributeModification`] combines its values with the
/// existing attribute bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeOp {
    /// Overwrite the attribute.
    Replace,
    /// Componentwise float addition.
    Add,
    /// Componentwise float product.
    Multiply,
    /// Write the L2-normalized value vector.
    Normalize,
}

impl AttributeOp {
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Replace => 0,
            Self::Add => 1,
            Self::Multiply => 2,
            Self::Normalize => 3,
        }
    }

    pub fn from_u32(value: u32) -> Result<Self> {
        Ok(match value {
            0 => Self::Replace,
            1 => Self::Add,
            2 => Self::Multiply,
            3 => Self::Normalize,
            other => {
                return Err(Error::Validation(format!(
                    "unknown attribute operation {other}"
                )))
            }
        })
    }
}

/// A single-attribute edit within a vertex.
#[derive(Debug, Clone, Copy)]
pub struct AttributeModification {
    /// Byte offset of the attribute within a vertex. Zero for operations
    /// whose offset is derived from the target's feature flags.
    pub attribute_offset: u32,
    /// Attribute size in bytes: 4, 8, 12 or 16.
    pub attribute_size: u32,
    /// Vertex index, or [`ALL_VERTICES`].
    pub vertex_index: u32,
    pub operation: AttributeOp,
    /// Up to four scalar operands; unused slots are zero.
    pub values: [f32; 4],
}

impl AttributeModification {
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(ATTRIBUTE_MODIFICATION_SIZE);
        writer.put_u32(self.attribute_offset);
        writer.put_u32(self.attribute_size);
        writer.put_u32(self.vertex_index);
        writer.put_u32(self.operation.as_u32());
        for v in self.values {
            writer.put_f32(v);
        }
        debug_assert_eq!(writer.len(), ATTRIBUTE_MODIFICATION_SIZE);
        writer.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ATTRIBUTE_MODIFICATION_SIZE {
            return Err(Error::Operation(format!(
                "attribute modification needs {ATTRIBUTE_MODIFICATION_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut reader = BinaryReader::new(bytes);
        Ok(Self {
            attribute_offset: reader.read_u32()?,
            attribute_size: reader.read_u32()?,
            vertex_index: reader.read_u32()?,
            operation: AttributeOp::from_u32(reader.read_u32()?)?,
            values: [
                reader.read_f32()?,
                reader.read_f32()?,
                reader.read_f32()?,
                reader.read_f32()?,
            ],
        })
    }
}

/// A 4x4 affine transform over a vertex range.
#[derive(Debug, Clone, Copy)]
pub struct TransformationData {
    /// Row-major 4x4 matrix.
    pub matrix: [f32; 16],
    /// Bit 0: transform positions. Bit 1: transform normals.
    pub flags: u32,
    pub vertex_start: u32,
    /// Number of vertices, or [`ALL_VERTICES`].
    pub vertex_count: u32,
}

impl TransformationData {
    pub const TRANSFORM_POSITIONS: u32 = 1 << 0;
    pub const TRANSFORM_NORMALS: u32 = 1 << 1;

    /// Identity transform over all vertices.
    pub fn identity() -> Self {
        let mut matrix = [0.0f32; 16];
        matrix[0] = 1.0;
        matrix[5] = 1.0;
        matrix[10] = 1.0;
        matrix[15] = 1.0;
        Self {
            matrix,
            flags: Self::TRANSFORM_POSITIONS,
            vertex_start: 0,
            vertex_count: ALL_VERTICES,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(TRANSFORMATION_DATA_SIZE);
        for v in self.matrix {
            writer.put_f32(v);
        }
        writer.put_u32(self.flags);
        writer.put_u32(self.vertex_start);
        writer.put_u32(self.vertex_count);
        debug_assert_eq!(writer.len(), TRANSFORMATION_DATA_SIZE);
        writer.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < TRANSFORMATION_DATA_SIZE {
            return Err(Error::Operation(format!(
                "transformation data needs {TRANSFORMATION_DATA_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut reader = BinaryReader::new(bytes);
        let mut matrix = [0.0f32; 16];
        for slot in &mut matrix {
            *slot = reader.read_f32()?;
        }
        Ok(Self {
            matrix,
            flags: reader.read_u32()?,
            vertex_start: reader.read_u32()?,
            vertex_count: reader.read_u32()?,
        })
    }
}

/// A subset record combined with an attribute modification applied to
/// every vertex in the range.
#[derive(Debug, Clone, Copy)]
pub struct SubsetModification {
    pub vertex_start: u32,
    pub vertex_count: u32,
    pub modification: AttributeModification,
}

impl SubsetModification {
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(SUBSET_MODIFICATION_SIZE);
        writer.put_u32(self.vertex_start);
        writer.put_u32(self.vertex_count);
        writer.put_bytes(&self.modification.encode());
        debug_assert_eq!(writer.len(), SUBSET_MODIFICATION_SIZE);
        writer.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SUBSET_MODIFICATION_SIZE {
            return Err(Error::Operation(format!(
                "subset modification needs {SUBSET_MODIFICATION_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut reader = BinaryReader::new(bytes);
        let vertex_start = reader.read_u32()?;
        let vertex_count = reader.read_u32()?;
        Ok(Self {
            vertex_start,
            vertex_count,
            modification: AttributeModification::decode(&bytes[8..])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = OverlayHeader {
            operation_count: 2,
            target_count: 1,
            total_size: 1234,
            creator: "test".into(),
            ..Default::default()
        };
        let bytes = header.encode();
        assert_eq!(bytes.len(), OVERLAY_HEADER_SIZE);

        let decoded = OverlayHeader::decode(&bytes).unwrap();
        assert_eq!(decoded.magic, *TAFO_MAGIC);
        assert_eq!(decoded.operation_count, 2);
        assert_eq!(decoded.target_count, 1);
        assert_eq!(decoded.total_size, 1234);
        assert!(decoded.feature_flags.contains(FeatureFlags::HASH_BASED_NAMES));
    }

    #[test]
    fn target_roundtrip() {
        let target = TargetAsset {
            asset_path: "assets/cube.taf".into(),
            asset_hash: 0,
            version_requirement: "^1.0.0".into(),
            required_features: FeatureFlags::HASH_BASED_NAMES.bits() as u32,
        };
        let bytes = target.encode();
        assert_eq!(bytes.len(), TARGET_ASSET_SIZE);

        let decoded = TargetAsset::decode(&bytes).unwrap();
        assert_eq!(decoded.asset_path, "assets/cube.taf");
        assert_eq!(decoded.version_requirement, "^1.0.0");
    }

    #[test]
    fn operation_roundtrip() {
        let op = OverlayOperation {
            operation_type: OperationType::ShaderReplace,
            target_chunk_type: taf_asset::ChunkType::SHDR,
            target_hash: 0xABCD,
            replacement_hash: 0x1234,
            data_offset: 16,
            data_size: 256,
            flags: 0,
        };
        let bytes = op.encode();
        assert_eq!(bytes.len(), OVERLAY_OPERATION_SIZE);

        let decoded = OverlayOperation::decode(&bytes).unwrap();
        assert_eq!(decoded.operation_type, OperationType::ShaderReplace);
        assert_eq!(decoded.target_hash, 0xABCD);
        assert_eq!(decoded.data_size, 256);
    }

    #[test]
    fn operation_type_tags_are_stable() {
        assert_eq!(OperationType::ChunkReplace.as_u32(), 0);
        assert_eq!(OperationType::ShaderReplace.as_u32(), 1);
        assert_eq!(OperationType::VertexColorChange.as_u32(), 2);
        assert_eq!(OperationType::GeometryModify.as_u32(), 4);
        assert_eq!(OperationType::VertexSubset.as_u32(), 13);
        assert!(OperationType::from_u32(14).is_err());
    }

    #[test]
    fn data_window_bounds() {
        let op = OverlayOperation {
            operation_type: OperationType::VertexColorChange,
            target_chunk_type: taf_asset::ChunkType::GEOM,
            target_hash: 0,
            replacement_hash: 0,
            data_offset: 4,
            data_size: 8,
            flags: 0,
        };
        let blob = [0u8; 12];
        assert_eq!(op.data(&blob).unwrap().len(), 8);

        let short = [0u8; 10];
        assert!(op.data(&short).is_err());
    }

    #[test]
    fn record_roundtrips() {
        let attr = AttributeModification {
            attribute_offset: 36,
            attribute_size: 16,
            vertex_index: 1,
            operation: AttributeOp::Replace,
            values: [1.0, 0.0, 0.0, 1.0],
        };
        let decoded = AttributeModification::decode(&attr.encode()).unwrap();
        assert_eq!(decoded.attribute_offset, 36);
        assert_eq!(decoded.operation, AttributeOp::Replace);
        assert_eq!(decoded.values, [1.0, 0.0, 0.0, 1.0]);

        let transform = TransformationData::identity();
        let decoded = TransformationData::decode(&transform.encode()).unwrap();
        assert_eq!(decoded.matrix[0], 1.0);
        assert_eq!(decoded.vertex_count, ALL_VERTICES);

        let subset = SubsetModification {
            vertex_start: 2,
            vertex_count: 5,
            modification: attr,
        };
        let decoded = SubsetModification::decode(&subset.encode()).unwrap();
        assert_eq!(decoded.vertex_start, 2);
        assert_eq!(decoded.modification.attribute_size, 16);
    }
}
