//! Geometry chunk payloads.
//!
//! A geometry payload is a [`GeometryHeader`] followed by a dense vertex
//! array of `vertex_count * vertex_stride` bytes and an optional index
//! array of `index_count * 4` bytes. The authoritative vertex layout is
//! whatever the producer packed at `vertex_stride`; the format bitmask is
//! a hint for consumers.

use taf_common::{BinaryReader, BinaryWriter};

use crate::header::Vec3Q;
use crate::{Error, Result};

/// Serialized size of [`GeometryHeader`] in bytes.
pub const GEOMETRY_HEADER_SIZE: usize = 112;

/// Vertex attribute presence bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexFormat(pub u32);

impl VertexFormat {
    pub const POSITION_3D: Self = Self(1 << 0);
    pub const POSITION_2D: Self = Self(1 << 1);
    pub const NORMAL: Self = Self(1 << 2);
    pub const TANGENT: Self = Self(1 << 3);
    pub const TEXCOORD0: Self = Self(1 << 4);
    pub const TEXCOORD1: Self = Self(1 << 5);
    pub const COLOR: Self = Self(1 << 6);
    pub const BONE_INDICES: Self = Self(1 << 7);
    pub const BONE_WEIGHTS: Self = Self(1 << 8);
    pub const CUSTOM0: Self = Self(1 << 16);
    pub const CUSTOM1: Self = Self(1 << 17);
    pub const CUSTOM2: Self = Self(1 << 18);
    pub const CUSTOM3: Self = Self(1 << 19);

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for VertexFormat {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// How the geometry is meant to be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Vertex/index buffer pipeline.
    #[default]
    Traditional = 0,
    /// Mesh-shader pipeline; output caps and workgroup size apply.
    MeshShader = 1,
}

impl RenderMode {
    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Traditional),
            1 => Ok(Self::MeshShader),
            other => Err(Error::Validation(format!("unknown render mode {other}"))),
        }
    }
}

/// Output primitive topology for mesh shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimitiveType {
    #[default]
    Triangles = 0,
    Lines = 1,
    Points = 2,
}

impl PrimitiveType {
    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Triangles),
            1 => Ok(Self::Lines),
            2 => Ok(Self::Points),
            other => Err(Error::Validation(format!("unknown primitive type {other}"))),
        }
    }
}

/// Fixed header at the start of every geometry payload.
#[derive(Debug, Clone, Default)]
pub struct GeometryHeader {
    pub vertex_count: u32,
    pub index_count: u32,
    /// Bytes per vertex; the producer-defined layout is authoritative.
    pub vertex_stride: u32,
    pub vertex_format: VertexFormat,
    pub bounds_min: Vec3Q,
    pub bounds_max: Vec3Q,
    pub lod_distance: f32,
    pub lod_level: u32,
    pub render_mode: RenderMode,
    pub ms_max_vertices: u32,
    pub ms_max_primitives: u32,
    pub ms_workgroup_size: [u32; 3],
    pub ms_primitive_type: PrimitiveType,
    pub ms_flags: u32,
}

impl GeometryHeader {
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(GEOMETRY_HEADER_SIZE);
        writer.put_u32(self.vertex_count);
        writer.put_u32(self.index_count);
        writer.put_u32(self.vertex_stride);
        writer.put_u32(self.vertex_format.0);
        self.bounds_min.write(&mut writer);
        self.bounds_max.write(&mut writer);
        writer.put_f32(self.lod_distance);
        writer.put_u32(self.lod_level);
        writer.put_u32(self.render_mode as u32);
        writer.put_u32(self.ms_max_vertices);
        writer.put_u32(self.ms_max_primitives);
        for ws in self.ms_workgroup_size {
            writer.put_u32(ws);
        }
        writer.put_u32(self.ms_primitive_type as u32);
        writer.put_u32(self.ms_flags);
        writer.put_zeros(2 * 4); // reserved
        debug_assert_eq!(writer.len(), GEOMETRY_HEADER_SIZE);
        writer.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);
        let header = Self {
            vertex_count: reader.read_u32()?,
            index_count: reader.read_u32()?,
            vertex_stride: reader.read_u32()?,
            vertex_format: VertexFormat(reader.read_u32()?),
            bounds_min: Vec3Q::read(&mut reader)?,
            bounds_max: Vec3Q::read(&mut reader)?,
            lod_distance: reader.read_f32()?,
            lod_level: reader.read_u32()?,
            render_mode: RenderMode::from_u32(reader.read_u32()?)?,
            ms_max_vertices: reader.read_u32()?,
            ms_max_primitives: reader.read_u32()?,
            ms_workgroup_size: [
                reader.read_u32()?,
                reader.read_u32()?,
                reader.read_u32()?,
            ],
            ms_primitive_type: PrimitiveType::from_u32(
                reader.read_u32()?,
            )?,
            ms_flags: reader.read_u32()?,
        };
        reader.advance(2 * 4);
        Ok(header)
    }
}

/// Assemble a geometry payload from a header, raw vertex bytes and
/// optional indices.
pub fn encode_payload(
    header: &GeometryHeader,
    vertex_bytes: &[u8],
    indices: &[u32],
) -> Result<Vec<u8>> {
    let expected_vertices = header.vertex_count as usize * header.vertex_stride as usize;
    if vertex_bytes.len() != expected_vertices {
        return Err(Error::Validation(format!(
            "vertex data is {} bytes, header declares {} * {} = {}",
            vertex_bytes.len(),
            header.vertex_count,
            header.vertex_stride,
            expected_vertices
        )));
    }
    if indices.len() != header.index_count as usize {
        return Err(Error::Validation(format!(
            "index array has {} entries, header declares {}",
            indices.len(),
            header.index_count
        )));
    }

    let mut writer =
        BinaryWriter::with_capacity(GEOMETRY_HEADER_SIZE + vertex_bytes.len() + indices.len() * 4);
    writer.put_bytes(&header.encode());
    writer.put_bytes(vertex_bytes);
    for &index in indices {
        writer.put_u32(index);
    }
    Ok(writer.into_bytes())
}

/// A validated view over a geometry payload.
#[derive(Debug)]
pub struct GeometryChunk<'a> {
    pub header: GeometryHeader,
    payload: &'a [u8],
}

impl<'a> GeometryChunk<'a> {
    /// Parse a payload, checking the declared sizes against its length.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        if payload.len() < GEOMETRY_HEADER_SIZE {
            return Err(Error::Validation(format!(
                "geometry payload too small: {} bytes",
                payload.len()
            )));
        }
        let header = GeometryHeader::decode(payload)?;

        let vertex_bytes = header.vertex_count as usize * header.vertex_stride as usize;
        let index_bytes = header.index_count as usize * 4;
        let needed = GEOMETRY_HEADER_SIZE + vertex_bytes + index_bytes;
        if payload.len() < needed {
            return Err(Error::Validation(format!(
                "geometry payload is {} bytes, header declares {needed}",
                payload.len()
            )));
        }

        Ok(Self { header, payload })
    }

    /// Raw vertex bytes.
    pub fn vertex_data(&self) -> &'a [u8] {
        let start = GEOMETRY_HEADER_SIZE;
        let len = self.header.vertex_count as usize * self.header.vertex_stride as usize;
        &self.payload[start..start + len]
    }

    /// Decoded index array, empty when the payload carries none.
    pub fn indices(&self) -> Vec<u32> {
        let start =
            GEOMETRY_HEADER_SIZE + self.header.vertex_count as usize * self.header.vertex_stride as usize;
        let mut reader = BinaryReader::new_at(self.payload, start);
        (0..self.header.index_count)
            .map(|_| reader.read_u32().expect("bounds checked in parse"))
            .collect()
    }

    /// Byte range of one vertex within the payload.
    pub fn vertex_range(&self, index: u32) -> Result<std::ops::Range<usize>> {
        if index >= self.header.vertex_count {
            return Err(Error::Validation(format!(
                "vertex index {index} out of range (count {})",
                self.header.vertex_count
            )));
        }
        let start = GEOMETRY_HEADER_SIZE + index as usize * self.header.vertex_stride as usize;
        Ok(start..start + self.header.vertex_stride as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(vertex_count: u32, stride: u32, index_count: u32) -> GeometryHeader {
        GeometryHeader {
            vertex_count,
            index_count,
            vertex_stride: stride,
            vertex_format: VertexFormat::POSITION_3D
                | VertexFormat::NORMAL
                | VertexFormat::COLOR
                | VertexFormat::TEXCOORD0
                | VertexFormat::TANGENT,
            bounds_min: Vec3Q::new(-128_000, -128_000, 0),
            bounds_max: Vec3Q::new(128_000, 128_000, 0),
            lod_distance: 1000.0,
            render_mode: RenderMode::MeshShader,
            ms_max_vertices: 24,
            ms_max_primitives: 12,
            ms_workgroup_size: [1, 1, 1],
            ..Default::default()
        }
    }

    #[test]
    fn header_roundtrip() {
        let header = sample_header(3, 76, 3);
        let bytes = header.encode();
        assert_eq!(bytes.len(), GEOMETRY_HEADER_SIZE);

        let decoded = GeometryHeader::decode(&bytes).unwrap();
        assert_eq!(decoded.vertex_count, 3);
        assert_eq!(decoded.vertex_stride, 76);
        assert_eq!(decoded.render_mode, RenderMode::MeshShader);
        assert_eq!(decoded.ms_max_vertices, 24);
        assert_eq!(decoded.bounds_max, header.bounds_max);
        assert!(decoded.vertex_format.contains(VertexFormat::COLOR));
    }

    #[test]
    fn payload_size_is_header_plus_vertices_plus_indices() {
        let header = sample_header(3, 76, 3);
        let vertices = vec![0u8; 3 * 76];
        let payload = encode_payload(&header, &vertices, &[0, 1, 2]).unwrap();
        assert_eq!(payload.len(), GEOMETRY_HEADER_SIZE + 3 * 76 + 12);

        let chunk = GeometryChunk::parse(&payload).unwrap();
        assert_eq!(chunk.vertex_data().len(), 3 * 76);
        assert_eq!(chunk.indices(), vec![0, 1, 2]);
    }

    #[test]
    fn mismatched_vertex_data_is_rejected() {
        let header = sample_header(3, 76, 0);
        assert!(encode_payload(&header, &[0u8; 10], &[]).is_err());
    }

    #[test]
    fn vertex_range_bounds() {
        let header = sample_header(2, 16, 0);
        let payload = encode_payload(&header, &[0u8; 32], &[]).unwrap();
        let chunk = GeometryChunk::parse(&payload).unwrap();

        assert_eq!(
            chunk.vertex_range(1).unwrap(),
            GEOMETRY_HEADER_SIZE + 16..GEOMETRY_HEADER_SIZE + 32
        );
        assert!(chunk.vertex_range(2).is_err());
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let header = sample_header(4, 76, 0);
        let mut payload = encode_payload(&header, &[0u8; 4 * 76], &[]).unwrap();
        payload.truncate(payload.len() - 1);
        assert!(GeometryChunk::parse(&payload).is_err());
    }
}
