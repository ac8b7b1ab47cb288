//! Asset header, feature flags, chunk tags and quantized coordinates.

use taf_common::{BinaryReader, BinaryWriter};

use crate::{Error, Result};

/// Magic bytes for master assets.
pub const TAF_MAGIC: &[u8; 4] = b"TAF!";

/// SPIR-V module magic word (little-endian).
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Serialized size of [`AssetHeader`] in bytes.
pub const HEADER_SIZE: usize = 360;

/// Quantized world-space coordinate: fixed point, 1/128000 of a world unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vec3Q {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl Vec3Q {
    /// Units per world meter.
    pub const UNITS_PER_METER: i64 = 128_000;

    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    pub(crate) fn read(reader: &mut BinaryReader<'_>) -> taf_common::Result<Self> {
        Ok(Self {
            x: reader.read_i64()?,
            y: reader.read_i64()?,
            z: reader.read_i64()?,
        })
    }

    pub(crate) fn write(&self, writer: &mut BinaryWriter) {
        writer.put_i64(self.x);
        writer.put_i64(self.y);
        writer.put_i64(self.z);
    }
}

/// Chunk type tag: four ASCII characters read as a little-endian u32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChunkType {
    Geometry,
    Material,
    Shader,
    Texture,
    Animation,
    Script,
    Physics,
    Audio,
    Font,
    Overlay,
    ChunkedOverlay,
    Fracture,
    Particle,
    SvgUi,
    Dependencies,
    /// A tag this implementation does not know; preserved verbatim.
    Unknown(u32),
}

/// Build a FourCC value from four ASCII bytes.
const fn fourcc(tag: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*tag)
}

impl ChunkType {
    pub const GEOM: u32 = fourcc(b"GEOM");
    pub const MTRL: u32 = fourcc(b"MTRL");
    pub const SHDR: u32 = fourcc(b"SHDR");
    pub const TXTR: u32 = fourcc(b"TXTR");
    pub const ANIM: u32 = fourcc(b"ANIM");
    pub const SCPT: u32 = fourcc(b"SCPT");
    pub const PHYS: u32 = fourcc(b"PHYS");
    pub const AUDI: u32 = fourcc(b"AUDI");
    pub const FONT: u32 = fourcc(b"FONT");
    pub const OVRL: u32 = fourcc(b"OVRL");
    pub const CHKO: u32 = fourcc(b"CHKO");
    pub const FRAC: u32 = fourcc(b"FRAC");
    pub const PART: u32 = fourcc(b"PART");
    pub const SVGU: u32 = fourcc(b"SVGU");
    pub const DEPS: u32 = fourcc(b"DEPS");

    /// Decode a tag value.
    pub const fn from_u32(value: u32) -> Self {
        match value {
            Self::GEOM => Self::Geometry,
            Self::MTRL => Self::Material,
            Self::SHDR => Self::Shader,
            Self::TXTR => Self::Texture,
            Self::ANIM => Self::Animation,
            Self::SCPT => Self::Script,
            Self::PHYS => Self::Physics,
            Self::AUDI => Self::Audio,
            Self::FONT => Self::Font,
            Self::OVRL => Self::Overlay,
            Self::CHKO => Self::ChunkedOverlay,
            Self::FRAC => Self::Fracture,
            Self::PART => Self::Particle,
            Self::SVGU => Self::SvgUi,
            Self::DEPS => Self::Dependencies,
            other => Self::Unknown(other),
        }
    }

    /// Encode the tag value.
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Geometry => Self::GEOM,
            Self::Material => Self::MTRL,
            Self::Shader => Self::SHDR,
            Self::Texture => Self::TXTR,
            Self::Animation => Self::ANIM,
            Self::Script => Self::SCPT,
            Self::Physics => Self::PHYS,
            Self::Audio => Self::AUDI,
            Self::Font => Self::FONT,
            Self::Overlay => Self::OVRL,
            Self::ChunkedOverlay => Self::CHKO,
            Self::Fracture => Self::FRAC,
            Self::Particle => Self::PART,
            Self::SvgUi => Self::SVGU,
            Self::Dependencies => Self::DEPS,
            Self::Unknown(other) => other,
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = self.as_u32().to_le_bytes();
        if value.iter().all(|b| b.is_ascii_graphic()) {
            for b in value {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            write!(f, "0x{:08X}", self.as_u32())
        }
    }
}

/// 64-bit capability mask describing which subsystems an asset uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags(pub u64);

impl FeatureFlags {
    pub const NONE: Self = Self(0);
    pub const QUANTIZED_COORDS: Self = Self(1 << 0);
    pub const MESH_SHADERS: Self = Self(1 << 1);
    pub const EMBEDDED_SHADERS: Self = Self(1 << 2);
    pub const SPIRV_CROSS: Self = Self(1 << 3);
    pub const HASH_BASED_NAMES: Self = Self(1 << 4);
    pub const FRACTURING: Self = Self(1 << 5);
    pub const PARTICLE_SYSTEMS: Self = Self(1 << 6);
    pub const PBR_MATERIALS: Self = Self(1 << 7);
    pub const ANIMATION: Self = Self(1 << 8);
    pub const PHYSICS: Self = Self(1 << 9);
    pub const AUDIO: Self = Self(1 << 10);
    pub const SCRIPTING: Self = Self(1 << 11);
    pub const MULTI_LOD: Self = Self(1 << 12);
    pub const VIRTUAL_TEXTURES: Self = Self(1 << 13);
    pub const SVG_UI: Self = Self(1 << 14);
    pub const OVERLAY_SUPPORT: Self = Self(1 << 15);
    pub const SDF_FONT: Self = Self(1 << 16);
    pub const STREAMING: Self = Self(1 << 17);
    pub const AI_BEHAVIOR: Self = Self(1 << 32);
    pub const NPU_PROCESSING: Self = Self(1 << 33);
    pub const LOCAL_LLM: Self = Self(1 << 34);
    pub const PSYCHOLOGICAL_AI: Self = Self(1 << 35);

    /// Exact-mask membership: every bit of `flag` must be present.
    #[inline]
    pub const fn contains(self, flag: FeatureFlags) -> bool {
        (self.0 & flag.0) == flag.0
    }

    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }
}

impl std::ops::BitOr for FeatureFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for FeatureFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for FeatureFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Fixed-layout file header at the start of every TAF file.
#[derive(Debug, Clone)]
pub struct AssetHeader {
    pub magic: [u8; 4],
    pub version_major: u32,
    pub version_minor: u32,
    pub version_patch: u32,
    /// 0 = master asset, 1 = overlay.
    pub asset_type: u32,
    pub feature_flags: FeatureFlags,
    pub chunk_count: u32,
    pub dependency_count: u32,
    pub ai_model_count: u32,
    pub total_size: u64,
    pub world_bounds_min: Vec3Q,
    pub world_bounds_max: Vec3Q,
    pub created_timestamp: u64,
    pub creator: String,
    pub description: String,
}

impl Default for AssetHeader {
    fn default() -> Self {
        Self {
            magic: *TAF_MAGIC,
            version_major: 1,
            version_minor: 0,
            version_patch: 0,
            asset_type: 0,
            feature_flags: FeatureFlags::NONE,
            chunk_count: 0,
            dependency_count: 0,
            ai_model_count: 0,
            total_size: HEADER_SIZE as u64,
            world_bounds_min: Vec3Q::default(),
            world_bounds_max: Vec3Q::default(),
            created_timestamp: 0,
            creator: "Unknown".to_string(),
            description: "Taffy Asset".to_string(),
        }
    }
}

impl AssetHeader {
    /// Serialize the header into its 360-byte on-disk form.
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(HEADER_SIZE);
        writer.put_bytes(&self.magic);
        writer.put_u32(self.version_major);
        writer.put_u32(self.version_minor);
        writer.put_u32(self.version_patch);
        writer.put_u32(self.asset_type);
        writer.put_u64(self.feature_flags.bits());
        writer.put_u32(self.chunk_count);
        writer.put_u32(self.dependency_count);
        writer.put_u32(self.ai_model_count);
        writer.put_u64(self.total_size);
        self.world_bounds_min.write(&mut writer);
        self.world_bounds_max.write(&mut writer);
        writer.put_u64(self.created_timestamp);
        writer.put_fixed_str(&self.creator, 64);
        writer.put_fixed_str(&self.description, 128);
        writer.put_zeros(16 * 4); // reserved
        debug_assert_eq!(writer.len(), HEADER_SIZE);
        writer.into_bytes()
    }

    /// Parse a header from bytes, without semantic validation.
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
            asset_type: reader.read_u32()?,
            feature_flags: FeatureFlags(reader.read_u64()?),
            chunk_count: reader.read_u32()?,
            dependency_count: reader.read_u32()?,
            ai_model_count: reader.read_u32()?,
            total_size: reader.read_u64()?,
            world_bounds_min: Vec3Q::read(&mut reader)?,
            world_bounds_max: Vec3Q::read(&mut reader)?,
            created_timestamp: reader.read_u64()?,
            creator: reader.read_string_in_buffer(64)?,
            description: reader.read_string_in_buffer(128)?,
        };
        reader.advance(16 * 4);
        Ok(header)
    }

    /// Validate magic, version, chunk count and declared size against the
    /// actual file size.
    ///
    /// On failure the error message carries a hex dump of the first 16
    /// bytes to help diagnose corrupted files.
    pub fn validate(&self, file_size: u64, raw: &[u8]) -> Result<()> {
        let mut problems = Vec::new();

        if &self.magic != TAF_MAGIC {
            problems.push(format!(
                "bad magic {:?} (expected {TAF_MAGIC:?})",
                self.magic
            ));
        }
        if self.version_major > 100 || self.version_minor > 100 || self.version_patch > 1000 {
            problems.push(format!(
                "implausible version {}.{}.{}",
                self.version_major, self.version_minor, self.version_patch
            ));
        }
        if self.chunk_count > 1000 {
            problems.push(format!("implausible chunk count {}", self.chunk_count));
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

        let dump: Vec<String> = raw
            .iter()
            .take(16)
            .map(|b| format!("{b:02x}"))
            .collect();
        Err(Error::Validation(format!(
            "{}; first 16 bytes: [{}]",
            problems.join("; "),
            dump.join(" ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let mut header = AssetHeader {
            creator: "Taffy".into(),
            description: "test".into(),
            feature_flags: FeatureFlags::AUDIO | FeatureFlags::HASH_BASED_NAMES,
            chunk_count: 3,
            world_bounds_min: Vec3Q::new(-128_000, -128_000, -128_000),
            world_bounds_max: Vec3Q::new(128_000, 128_000, 128_000),
            ..Default::default()
        };
        header.total_size = 4096;

        let bytes = header.encode();
        assert_eq!(bytes.len(), HEADER_SIZE);

        let decoded = AssetHeader::decode(&bytes).unwrap();
        assert_eq!(decoded.magic, *TAF_MAGIC);
        assert_eq!(decoded.creator, "Taffy");
        assert_eq!(decoded.description, "test");
        assert_eq!(decoded.feature_flags, header.feature_flags);
        assert_eq!(decoded.chunk_count, 3);
        assert_eq!(decoded.total_size, 4096);
        assert_eq!(decoded.world_bounds_min, header.world_bounds_min);
    }

    #[test]
    fn fourcc_values_are_little_endian_ascii() {
        assert_eq!(ChunkType::GEOM, 0x4D4F_4547);
        assert_eq!(ChunkType::MTRL, 0x4C52_544D);
        assert_eq!(ChunkType::SHDR, 0x5244_4853);
        assert_eq!(ChunkType::AUDI, 0x4944_5541);
        assert_eq!(ChunkType::Geometry.to_string(), "GEOM");
    }

    #[test]
    fn unknown_tag_is_preserved() {
        let tag = ChunkType::from_u32(0x12345678);
        assert_eq!(tag, ChunkType::Unknown(0x12345678));
        assert_eq!(tag.as_u32(), 0x12345678);
    }

    #[test]
    fn feature_flag_membership_is_exact_mask() {
        let flags = FeatureFlags::QUANTIZED_COORDS | FeatureFlags::HASH_BASED_NAMES;
        assert!(flags.contains(FeatureFlags::QUANTIZED_COORDS));
        assert!(flags.contains(FeatureFlags::QUANTIZED_COORDS | FeatureFlags::HASH_BASED_NAMES));
        assert!(!flags.contains(FeatureFlags::QUANTIZED_COORDS | FeatureFlags::AUDIO));
        assert!(flags.contains(FeatureFlags::NONE));
    }

    #[test]
    fn validate_rejects_size_mismatch() {
        let header = AssetHeader::default();
        let raw = header.encode();
        assert!(header.validate(HEADER_SIZE as u64, &raw).is_ok());
        let err = header.validate(HEADER_SIZE as u64 + 1, &raw).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("first 16 bytes"));
    }

    #[test]
    fn validate_rejects_bad_magic_with_dump() {
        let mut header = AssetHeader::default();
        header.magic = *b"NOPE";
        let raw = header.encode();
        let err = header.validate(HEADER_SIZE as u64, &raw).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bad magic"));
        // 'N' = 0x4e is the first dumped byte
        assert!(msg.contains("4e"));
    }
}
