//! PBR material chunk payloads.

use taf_common::{BinaryReader, BinaryWriter};

use crate::{Error, Result};

/// Serialized size of the material payload header in bytes.
pub const MATERIAL_HEADER_SIZE: usize = 32;

/// Serialized size of one [`Material`] record in bytes.
pub const MATERIAL_RECORD_SIZE: usize = 132;

/// Sentinel texture index meaning "no texture".
pub const NO_TEXTURE: u32 = u32::MAX;

/// Material behavior flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaterialFlags(pub u32);

impl MaterialFlags {
    pub const NONE: Self = Self(0);
    pub const DOUBLE_SIDED: Self = Self(1 << 0);
    pub const TRANSPARENT: Self = Self(1 << 1);
    pub const EMISSIVE: Self = Self(1 << 2);
    pub const UNLIT: Self = Self(1 << 3);
    pub const CAST_SHADOWS: Self = Self(1 << 4);
    pub const RECEIVE_SHADOWS: Self = Self(1 << 5);
    pub const WIREFRAME: Self = Self(1 << 6);

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for MaterialFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One PBR material record.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub albedo: [f32; 4],
    pub emission: [f32; 3],
    pub metallic: f32,
    pub roughness: f32,
    pub normal_intensity: f32,
    pub alpha_cutoff: f32,
    pub albedo_texture: u32,
    pub normal_texture: u32,
    pub metallic_roughness_texture: u32,
    pub emission_texture: u32,
    pub occlusion_texture: u32,
    pub flags: MaterialFlags,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            albedo: [1.0, 1.0, 1.0, 1.0],
            emission: [0.0; 3],
            metallic: 0.0,
            roughness: 0.8,
            normal_intensity: 1.0,
            alpha_cutoff: 0.0,
            albedo_texture: NO_TEXTURE,
            normal_texture: NO_TEXTURE,
            metallic_roughness_texture: NO_TEXTURE,
            emission_texture: NO_TEXTURE,
            occlusion_texture: NO_TEXTURE,
            flags: MaterialFlags::NONE,
        }
    }
}

impl Material {
    fn write(&self, writer: &mut BinaryWriter) {
        writer.put_fixed_str(&self.name, 32);
        for v in self.albedo {
            writer.put_f32(v);
        }
        for v in self.emission {
            writer.put_f32(v);
        }
        writer.put_f32(self.metallic);
        writer.put_f32(self.roughness);
        writer.put_f32(self.normal_intensity);
        writer.put_f32(self.alpha_cutoff);
        writer.put_u32(self.albedo_texture);
        writer.put_u32(self.normal_texture);
        writer.put_u32(self.metallic_roughness_texture);
        writer.put_u32(self.emission_texture);
        writer.put_u32(self.occlusion_texture);
        writer.put_u32(self.flags.0);
        writer.put_zeros(8 * 4); // reserved
    }

    fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let material = Self {
            name: reader.read_string_in_buffer(32)?,
            albedo: [
                reader.read_f32()?,
                reader.read_f32()?,
                reader.read_f32()?,
                reader.read_f32()?,
            ],
            emission: [
                reader.read_f32()?,
                reader.read_f32()?,
                reader.read_f32()?,
            ],
            metallic: reader.read_f32()?,
            roughness: reader.read_f32()?,
            normal_intensity: reader.read_f32()?,
            alpha_cutoff: reader.read_f32()?,
            albedo_texture: reader.read_u32()?,
            normal_texture: reader.read_u32()?,
            metallic_roughness_texture: reader.read_u32()?,
            emission_texture: reader.read_u32()?,
            occlusion_texture: reader.read_u32()?,
            flags: MaterialFlags(reader.read_u32()?),
        };
        reader.advance(8 * 4);
        Ok(material)
    }
}

/// Encode a material payload: count header plus records.
pub fn encode_payload(materials: &[Material]) -> Vec<u8> {
    let mut writer = BinaryWriter::with_capacity(
        MATERIAL_HEADER_SIZE + materials.len() * MATERIAL_RECORD_SIZE,
    );
    writer.put_u32(materials.len() as u32);
    writer.put_zeros(7 * 4); // reserved
    for material in materials {
        material.write(&mut writer);
    }
    writer.into_bytes()
}

/// Decode a material payload.
pub fn decode_payload(payload: &[u8]) -> Result<Vec<Material>> {
    if payload.len() < MATERIAL_HEADER_SIZE {
        return Err(Error::Validation(format!(
            "material payload too small: {} bytes",
            payload.len()
        )));
    }
    let mut reader = BinaryReader::new(payload);
    let count = reader.read_u32()? as usize;
    reader.advance(7 * 4);

    let needed = MATERIAL_HEADER_SIZE + count * MATERIAL_RECORD_SIZE;
    if payload.len() < needed {
        return Err(Error::Validation(format!(
            "material payload is {} bytes, header declares {needed}",
            payload.len()
        )));
    }

    (0..count).map(|_| Material::read(&mut reader)).collect()
}
