//! Application of overlay operations to a target asset.
//!
//! Operations run in declaration order. Geometry edits work on a copy of
//! the target payload which is reinserted under its original tag and
//! name, so directory sizes and CRCs are recomputed by the container.

use taf_asset::chunks::shader;
use taf_asset::{Asset, ChunkType, FeatureFlags, GeometryChunk, ShaderEntry, GEOMETRY_HEADER_SIZE};

use crate::format::{
    AttributeModification, AttributeOp, OperationType, OverlayOperation, SubsetModification,
    TransformationData, ALL_VERTICES, ATTRIBUTE_MODIFICATION_SIZE,
};
use crate::overlay::Overlay;
use crate::{Error, Result};

/// Major version of the overlay engine; overlays authored for a newer
/// major version are rejected.
pub const ENGINE_MAJOR_VERSION: u32 = 1;

/// Byte offset of the color attribute within a vertex, derived from the
/// target's feature flags: a quantized position is 24 bytes, a float
/// position 12, followed by a 12-byte normal.
fn color_offset(flags: FeatureFlags) -> usize {
    if flags.contains(FeatureFlags::QUANTIZED_COORDS) {
        36
    } else {
        24
    }
}

/// Byte offset of the normal attribute within a vertex.
fn normal_offset(flags: FeatureFlags) -> usize {
    if flags.contains(FeatureFlags::QUANTIZED_COORDS) {
        24
    } else {
        12
    }
}

/// Byte offset of the first UV attribute within a vertex (after the
/// 16-byte color).
fn uv_offset(flags: FeatureFlags) -> usize {
    if flags.contains(FeatureFlags::QUANTIZED_COORDS) {
        52
    } else {
        40
    }
}

impl Overlay {
    /// Check whether this overlay can apply to `asset`: the asset must
    /// advertise hash-based names and the overlay's major version must
    /// not exceed the engine's.
    pub fn targets_asset(&self, asset: &Asset) -> bool {
        if !asset.has_feature(FeatureFlags::HASH_BASED_NAMES) {
            log::warn!("target asset does not support hash-based names");
            return false;
        }
        if self.header().version_major > ENGINE_MAJOR_VERSION {
            log::warn!(
                "overlay version {} exceeds engine version {ENGINE_MAJOR_VERSION}",
                self.header().version_major
            );
            return false;
        }
        true
    }

    /// Apply every operation in declaration order, mutating `asset` in
    /// memory. Directory checksums and the chunk count are re-synchronized
    /// as chunks are rewritten, leaving the asset ready for resave.
    pub fn apply_to_asset(&self, asset: &mut Asset) -> Result<()> {
        if !self.targets_asset(asset) {
            return Err(Error::Validation(
                "overlay does not target this asset".into(),
            ));
        }

        log::info!("applying {} overlay operations", self.operations().len());
        for (i, op) in self.operations().iter().enumerate() {
            self.apply_operation(asset, op)
                .map_err(|e| match e {
                    Error::Operation(msg) => Error::Operation(format!("operation {i}: {msg}")),
                    other => other,
                })?;
        }
        Ok(())
    }

    fn apply_operation(&self, asset: &mut Asset, op: &OverlayOperation) -> Result<()> {
        let data = op.data(self.operation_data())?;
        match op.operation_type {
            OperationType::ShaderReplace => apply_shader_replacement(asset, op, data),
            OperationType::VertexColorChange => apply_vertex_color_change(asset, op, data),
            OperationType::VertexPositionChange | OperationType::VertexAttributeChange => {
                let modification = AttributeModification::decode(data)?;
                with_geometry(asset, |chunk, flags, bytes| {
                    apply_attribute(chunk, flags, bytes, &modification, OffsetPolicy::Stored)
                })
            }
            OperationType::GeometryScale
            | OperationType::GeometryRotate
            | OperationType::GeometryTranslate
            | OperationType::GeometryTransform => {
                let transform = TransformationData::decode(data)?;
                with_geometry(asset, |chunk, _flags, bytes| {
                    apply_transform(chunk, bytes, &transform)
                })
            }
            OperationType::UvModification => {
                let modification = AttributeModification::decode(data)?;
                with_geometry(asset, |chunk, flags, bytes| {
                    apply_uv(chunk, flags, bytes, &modification)
                })
            }
            OperationType::NormalRecalculation => {
                // Accepted with or without an attribute record; without
                // one this operation is a no-op.
                if data.len() < ATTRIBUTE_MODIFICATION_SIZE {
                    log::debug!("normal recalculation without payload, skipping");
                    return Ok(());
                }
                let modification = AttributeModification::decode(data)?;
                with_geometry(asset, |chunk, flags, bytes| {
                    apply_attribute(
                        chunk,
                        flags,
                        bytes,
                        &modification,
                        OffsetPolicy::Derived(normal_offset(flags)),
                    )
                })
            }
            OperationType::VertexSubset => {
                let subset = SubsetModification::decode(data)?;
                with_geometry(asset, |chunk, flags, bytes| {
                    apply_subset(chunk, flags, bytes, &subset)
                })
            }
            OperationType::ChunkReplace
            | OperationType::MaterialReplace
            | OperationType::GeometryModify => apply_chunk_replacement(asset, op, data),
        }
    }
}

/// Where an attribute edit finds its byte offset within the vertex.
#[derive(Clone, Copy)]
enum OffsetPolicy {
    /// Use the offset stored in the record.
    Stored,
    /// Use an offset derived from the target's feature flags.
    Derived(usize),
}

/// Run a mutation against a copy of the geometry payload, then reinsert
/// it under the original tag and name.
fn with_geometry<F>(asset: &mut Asset, mutate: F) -> Result<()>
where
    F: FnOnce(&GeometryChunk<'_>, FeatureFlags, &mut [u8]) -> Result<()>,
{
    let payload = asset
        .get_chunk_data(ChunkType::Geometry)
        .ok_or_else(|| Error::Operation("no geometry chunk in target asset".into()))?;
    let flags = asset.feature_flags();

    let mut modified = payload.to_vec();
    {
        let chunk = GeometryChunk::parse(payload)?;
        mutate(&chunk, flags, &mut modified)?;
    }

    let name = asset
        .directory()
        .iter()
        .find(|e| e.chunk_type == ChunkType::Geometry)
        .map(|e| e.name.clone())
        .unwrap_or_else(|| "geometry".to_string());
    asset.add_chunk(ChunkType::Geometry, modified, &name);
    Ok(())
}

/// Resolve a single vertex index or the whole range for `ALL_VERTICES`.
fn vertex_indices(chunk: &GeometryChunk<'_>, index: u32) -> Result<std::ops::Range<u32>> {
    if index == ALL_VERTICES {
        return Ok(0..chunk.header.vertex_count);
    }
    if index >= chunk.header.vertex_count {
        return Err(Error::Operation(format!(
            "vertex index {index} out of range (count {})",
            chunk.header.vertex_count
        )));
    }
    Ok(index..index + 1)
}

fn attribute_span(
    chunk: &GeometryChunk<'_>,
    bytes_len: usize,
    vertex: u32,
    offset: usize,
    size: usize,
) -> Result<std::ops::Range<usize>> {
    let start = GEOMETRY_HEADER_SIZE + vertex as usize * chunk.header.vertex_stride as usize + offset;
    let end = start + size;
    if end > bytes_len {
        return Err(Error::Operation(format!(
            "attribute write [{start}, {end}) overruns payload of {bytes_len} bytes"
        )));
    }
    Ok(start..end)
}

fn read_floats(bytes: &[u8], range: std::ops::Range<usize>) -> Vec<f32> {
    bytes[range]
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn write_floats(bytes: &mut [u8], start: usize, values: &[f32]) {
    for (i, v) in values.iter().enumerate() {
        bytes[start + i * 4..start + i * 4 + 4].copy_from_slice(&v.to_le_bytes());
    }
}

fn apply_attribute(
    chunk: &GeometryChunk<'_>,
    _flags: FeatureFlags,
    bytes: &mut [u8],
    modification: &AttributeModification,
    policy: OffsetPolicy,
) -> Result<()> {
    if !matches!(modification.attribute_size, 4 | 8 | 12 | 16) {
        return Err(Error::Operation(format!(
            "attribute size {} is not one of 4, 8, 12, 16",
            modification.attribute_size
        )));
    }
    let offset = match policy {
        OffsetPolicy::Stored => modification.attribute_offset as usize,
        OffsetPolicy::Derived(derived) => derived,
    };
    let components = modification.attribute_size as usize / 4;

    for vertex in vertex_indices(chunk, modification.vertex_index)? {
        let span = attribute_span(
            chunk,
            bytes.len(),
            vertex,
            offset,
            modification.attribute_size as usize,
        )?;
        let start = span.start;
        let current = read_floats(bytes, span);
        let values = &modification.values[..components];

        let result: Vec<f32> = match modification.operation {
            AttributeOp::Replace => values.to_vec(),
            AttributeOp::Add => current.iter().zip(values).map(|(c, v)| c + v).collect(),
            AttributeOp::Multiply => current.iter().zip(values).map(|(c, v)| c * v).collect(),
            AttributeOp::Normalize => {
                let len = values.iter().map(|v| v * v).sum::<f32>().sqrt();
                if len > 0.0 {
                    values.iter().map(|v| v / len).collect()
                } else {
                    values.to_vec()
                }
            }
        };
        write_floats(bytes, start, &result);
    }
    Ok(())
}

fn apply_vertex_color_change(asset: &mut Asset, op: &OverlayOperation, data: &[u8]) -> Result<()> {
    if data.len() < 16 {
        return Err(Error::Operation(format!(
            "vertex color change carries {} bytes, need 16",
            data.len()
        )));
    }
    let vertex_index = op.target_hash as u32;
    let mut rgba = [0.0f32; 4];
    for (i, slot) in rgba.iter_mut().enumerate() {
        *slot = f32::from_le_bytes(data[i * 4..i * 4 + 4].try_into().expect("length checked"));
    }

    with_geometry(asset, |chunk, flags, bytes| {
        let modification = AttributeModification {
            attribute_offset: 0,
            attribute_size: 16,
            vertex_index,
            operation: AttributeOp::Replace,
            values: rgba,
        };
        apply_attribute(
            chunk,
            flags,
            bytes,
            &modification,
            OffsetPolicy::Derived(color_offset(flags)),
        )
    })
}

fn apply_uv(
    chunk: &GeometryChunk<'_>,
    flags: FeatureFlags,
    bytes: &mut [u8],
    modification: &AttributeModification,
) -> Result<()> {
    let mut u = modification.values[0];
    let mut v = modification.values[1];
    if modification.values[2] != 0.0 {
        u = 1.0 - u;
    }
    if modification.values[3] != 0.0 {
        v = 1.0 - v;
    }
    let resolved = AttributeModification {
        attribute_size: 8,
        values: [u, v, 0.0, 0.0],
        ..*modification
    };
    apply_attribute(
        chunk,
        flags,
        bytes,
        &resolved,
        OffsetPolicy::Derived(uv_offset(flags)),
    )
}

fn apply_subset(
    chunk: &GeometryChunk<'_>,
    flags: FeatureFlags,
    bytes: &mut [u8],
    subset: &SubsetModification,
) -> Result<()> {
    let vertex_count = chunk.header.vertex_count;
    let end = if subset.vertex_count == ALL_VERTICES {
        vertex_count
    } else {
        let end = subset.vertex_start as u64 + subset.vertex_count as u64;
        if end > vertex_count as u64 {
            return Err(Error::Operation(format!(
                "vertex subset [{}, {end}) out of range (count {vertex_count})",
                subset.vertex_start
            )));
        }
        end as u32
    };

    // A zero stored offset with a 16-byte attribute is a color edit; its
    // offset follows the feature-flag policy like single-vertex colors.
    let policy = if subset.modification.attribute_offset == 0
        && subset.modification.attribute_size == 16
    {
        OffsetPolicy::Derived(color_offset(flags))
    } else {
        OffsetPolicy::Stored
    };

    for vertex in subset.vertex_start..end {
        let modification = AttributeModification {
            vertex_index: vertex,
            ..subset.modification
        };
        apply_attribute(chunk, flags, bytes, &modification, policy)?;
    }
    Ok(())
}

fn apply_transform(
    chunk: &GeometryChunk<'_>,
    bytes: &mut [u8],
    transform: &TransformationData,
) -> Result<()> {
    let vertex_count = chunk.header.vertex_count;
    let start = transform.vertex_start.min(vertex_count);
    let end = if transform.vertex_count == ALL_VERTICES {
        vertex_count
    } else {
        // Transform ranges clamp to the vertex count.
        (transform.vertex_start as u64 + transform.vertex_count as u64).min(vertex_count as u64)
            as u32
    };
    let m = &transform.matrix;

    for vertex in start..end {
        if transform.flags & TransformationData::TRANSFORM_POSITIONS != 0 {
            let span = attribute_span(chunk, bytes.len(), vertex, 0, 12)?;
            let span_start = span.start;
            let p = read_floats(bytes, span);
            // Affine transform of a homogeneous point with w = 1.
            let out = [
                m[0] * p[0] + m[1] * p[1] + m[2] * p[2] + m[3],
                m[4] * p[0] + m[5] * p[1] + m[6] * p[2] + m[7],
                m[8] * p[0] + m[9] * p[1] + m[10] * p[2] + m[11],
            ];
            write_floats(bytes, span_start, &out);
        }

        if transform.flags & TransformationData::TRANSFORM_NORMALS != 0 {
            let span = attribute_span(chunk, bytes.len(), vertex, 12, 12)?;
            let span_start = span.start;
            let n = read_floats(bytes, span);
            // Linear part only, then renormalize.
            let mut out = [
                m[0] * n[0] + m[1] * n[1] + m[2] * n[2],
                m[4] * n[0] + m[5] * n[1] + m[6] * n[2],
                m[8] * n[0] + m[9] * n[1] + m[10] * n[2],
            ];
            let len = (out[0] * out[0] + out[1] * out[1] + out[2] * out[2]).sqrt();
            if len > 0.0 {
                for v in &mut out {
                    *v /= len;
                }
            }
            write_floats(bytes, span_start, &out);
        }
    }
    Ok(())
}

fn apply_shader_replacement(asset: &mut Asset, op: &OverlayOperation, data: &[u8]) -> Result<()> {
    let payload = asset
        .get_chunk_data(ChunkType::Shader)
        .ok_or_else(|| Error::Operation("no shader chunk in target asset".into()))?;

    let shaders = shader::decode_payload(payload)?;
    let mut found = false;
    let mut entries: Vec<ShaderEntry> = Vec::with_capacity(shaders.len());
    for (descriptor, blob) in shaders {
        if descriptor.name_hash == op.target_hash {
            found = true;
            log::debug!(
                "replacing shader 0x{:016X} ({} -> {} bytes)",
                op.target_hash,
                blob.len(),
                data.len()
            );
            entries.push(ShaderEntry {
                descriptor,
                spirv: data.to_vec(),
            });
        } else {
            entries.push(ShaderEntry {
                descriptor,
                spirv: blob.to_vec(),
            });
        }
    }
    if !found {
        return Err(Error::Operation(format!(
            "no shader with name hash 0x{:016X}",
            op.target_hash
        )));
    }

    let rebuilt = shader::encode_payload(&entries)?;
    let name = asset
        .directory()
        .iter()
        .find(|e| e.chunk_type == ChunkType::Shader)
        .map(|e| e.name.clone())
        .unwrap_or_else(|| "shaders".to_string());
    asset.add_chunk(ChunkType::Shader, rebuilt, &name);
    Ok(())
}

fn apply_chunk_replacement(asset: &mut Asset, op: &OverlayOperation, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Err(Error::Operation("chunk replacement carries no data".into()));
    }
    let tag = ChunkType::from_u32(op.target_chunk_type);
    let name = asset
        .directory()
        .iter()
        .find(|e| e.chunk_type == tag)
        .map(|e| e.name.clone())
        .unwrap_or_else(|| tag.to_string());
    asset.add_chunk(tag, data.to_vec(), &name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::VertexRange;
    use taf_asset::chunks::geometry::{self, GeometryHeader, RenderMode, VertexFormat};
    use taf_asset::chunks::shader::{placeholder_spirv, ShaderDescriptor};
    use taf_asset::{ShaderStage, Vec3Q};
    use taf_common::hash::shader_hashes;

    /// Quantized vertex layout used by the fixtures: Vec3Q position (24),
    /// normal (12), color (16), uv (8), tangent (16) = 76 bytes.
    const STRIDE: usize = 76;

    fn quantized_vertex(color: [f32; 4]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(STRIDE);
        for q in [1_280_000i64, -1_280_000, 0] {
            bytes.extend_from_slice(&q.to_le_bytes());
        }
        for n in [0.0f32, 0.0, 1.0] {
            bytes.extend_from_slice(&n.to_le_bytes());
        }
        for c in color {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
        for uv in [0.25f32, 0.75] {
            bytes.extend_from_slice(&uv.to_le_bytes());
        }
        for t in [1.0f32, 0.0, 0.0, 1.0] {
            bytes.extend_from_slice(&t.to_le_bytes());
        }
        bytes
    }

    fn float_vertex() -> Vec<u8> {
        // Float layout: position (12), normal (12), color (16), uv (8).
        let mut bytes = Vec::new();
        for p in [1.0f32, 2.0, 3.0] {
            bytes.extend_from_slice(&p.to_le_bytes());
        }
        for n in [0.0f32, 1.0, 0.0] {
            bytes.extend_from_slice(&n.to_le_bytes());
        }
        for c in [1.0f32, 1.0, 1.0, 1.0] {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
        for uv in [0.0f32, 0.0] {
            bytes.extend_from_slice(&uv.to_le_bytes());
        }
        bytes
    }

    fn quantized_asset(vertex_count: u32) -> Asset {
        let mut vertices = Vec::new();
        for _ in 0..vertex_count {
            vertices.extend_from_slice(&quantized_vertex([0.2, 0.4, 0.6, 1.0]));
        }
        let header = GeometryHeader {
            vertex_count,
            index_count: 0,
            vertex_stride: STRIDE as u32,
            vertex_format: VertexFormat::POSITION_3D
                | VertexFormat::NORMAL
                | VertexFormat::COLOR
                | VertexFormat::TEXCOORD0
                | VertexFormat::TANGENT,
            bounds_min: Vec3Q::new(-1_280_000, -1_280_000, 0),
            bounds_max: Vec3Q::new(1_280_000, 1_280_000, 0),
            lod_distance: 1000.0,
            render_mode: RenderMode::Traditional,
            ..Default::default()
        };
        let payload = geometry::encode_payload(&header, &vertices, &[]).unwrap();

        let mut asset = Asset::new();
        asset.set_feature_flags(
            FeatureFlags::QUANTIZED_COORDS | FeatureFlags::HASH_BASED_NAMES,
        );
        asset.add_chunk(ChunkType::Geometry, payload, "triangle_geometry");
        asset
    }

    fn float_asset(vertex_count: u32) -> Asset {
        let mut vertices = Vec::new();
        for _ in 0..vertex_count {
            vertices.extend_from_slice(&float_vertex());
        }
        let header = GeometryHeader {
            vertex_count,
            vertex_stride: 48,
            vertex_format: VertexFormat::POSITION_3D | VertexFormat::NORMAL | VertexFormat::COLOR,
            ..Default::default()
        };
        let payload = geometry::encode_payload(&header, &vertices, &[]).unwrap();

        let mut asset = Asset::new();
        asset.set_feature_flags(FeatureFlags::HASH_BASED_NAMES);
        asset.add_chunk(ChunkType::Geometry, payload, "float_geometry");
        asset
    }

    fn floats_at(asset: &Asset, offset: usize, count: usize) -> Vec<f32> {
        let payload = asset.get_chunk_data(ChunkType::Geometry).unwrap();
        payload[offset..offset + count * 4]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn targeting_requires_hash_based_names() {
        let overlay = Overlay::new();
        let mut asset = quantized_asset(3);
        assert!(overlay.targets_asset(&asset));

        asset.set_feature_flags(FeatureFlags::QUANTIZED_COORDS);
        assert!(!overlay.targets_asset(&asset));
        assert!(overlay.apply_to_asset(&mut asset).is_err());
    }

    #[test]
    fn vertex_color_change_quantized_layout() {
        let mut asset = quantized_asset(3);
        let mut overlay = Overlay::new();
        overlay.add_vertex_color_change(1, 1.0, 0.0, 0.0, 1.0);
        overlay.apply_to_asset(&mut asset).unwrap();

        // Color of vertex 1 sits at header + 1 * 76 + 36.
        let offset = GEOMETRY_HEADER_SIZE + STRIDE + 36;
        assert_eq!(floats_at(&asset, offset, 4), vec![1.0, 0.0, 0.0, 1.0]);
        // Vertex 0 is untouched.
        let offset0 = GEOMETRY_HEADER_SIZE + 36;
        assert_eq!(floats_at(&asset, offset0, 4), vec![0.2, 0.4, 0.6, 1.0]);
    }

    #[test]
    fn vertex_color_change_float_layout_uses_offset_24() {
        let mut asset = float_asset(2);
        let mut overlay = Overlay::new();
        overlay.add_vertex_color_change(0, 0.0, 1.0, 0.0, 0.5);
        overlay.apply_to_asset(&mut asset).unwrap();

        let offset = GEOMETRY_HEADER_SIZE + 24;
        assert_eq!(floats_at(&asset, offset, 4), vec![0.0, 1.0, 0.0, 0.5]);
    }

    #[test]
    fn vertex_index_out_of_range_errors() {
        let mut asset = quantized_asset(3);
        let mut overlay = Overlay::new();
        overlay.add_vertex_color_change(3, 1.0, 0.0, 0.0, 1.0);
        let err = overlay.apply_to_asset(&mut asset).unwrap_err();
        assert!(matches!(err, Error::Operation(_)));
    }

    #[test]
    fn short_operation_data_errors() {
        use crate::format::OVERLAY_HEADER_SIZE;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short_data.tafo");

        let mut overlay = Overlay::new();
        overlay.add_vertex_color_change(0, 1.0, 0.0, 0.0, 1.0);
        overlay.save_to_file(&path).unwrap();

        // Shrink the declared data window to 8 of the 16 color bytes; the
        // data_size field sits 32 bytes into the first operation record.
        let mut bytes = std::fs::read(&path).unwrap();
        let field = OVERLAY_HEADER_SIZE + 32;
        bytes[field..field + 8].copy_from_slice(&8u64.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let truncated = Overlay::load_from_file(&path).unwrap();
        let mut asset = quantized_asset(3);
        let err = truncated.apply_to_asset(&mut asset).unwrap_err();
        assert!(matches!(err, Error::Operation(_)));
    }

    #[test]
    fn shader_replacement_updates_size_and_magic() {
        let entries = vec![
            ShaderEntry {
                descriptor: ShaderDescriptor {
                    name_hash: shader_hashes::TRIANGLE_MESH,
                    entry_point_hash: shader_hashes::MAIN_ENTRY,
                    stage: ShaderStage::MeshShader,
                    ..Default::default()
                },
                spirv: placeholder_spirv(16),
            },
            ShaderEntry {
                descriptor: ShaderDescriptor {
                    name_hash: shader_hashes::DATA_DRIVEN_FRAG,
                    entry_point_hash: shader_hashes::MAIN_ENTRY,
                    stage: ShaderStage::Fragment,
                    ..Default::default()
                },
                spirv: placeholder_spirv(16),
            },
        ];
        let payload = shader::encode_payload(&entries).unwrap();

        let mut asset = Asset::new();
        asset.set_feature_flags(FeatureFlags::HASH_BASED_NAMES);
        asset.add_chunk(ChunkType::Shader, payload, "hash_based_shaders");

        let replacement = placeholder_spirv(64);
        assert_eq!(replacement.len(), 256);

        let mut overlay = Overlay::new();
        overlay.add_shader_replacement(
            shader_hashes::DATA_DRIVEN_FRAG,
            shader_hashes::TRIANGLE_FRAG,
            &replacement,
        );
        overlay.apply_to_asset(&mut asset).unwrap();

        let rebuilt = asset.get_chunk_data(ChunkType::Shader).unwrap();
        let shaders = shader::decode_payload(rebuilt).unwrap();
        let (descriptor, blob) = shaders
            .iter()
            .find(|(d, _)| d.name_hash == shader_hashes::DATA_DRIVEN_FRAG)
            .unwrap();
        assert_eq!(descriptor.spirv_size, 256);
        assert_eq!(blob.len(), 256);
        let magic = u32::from_le_bytes(blob[..4].try_into().unwrap());
        assert_eq!(magic, taf_asset::SPIRV_MAGIC);

        // The untouched shader keeps its original blob.
        let (other, other_blob) = shaders
            .iter()
            .find(|(d, _)| d.name_hash == shader_hashes::TRIANGLE_MESH)
            .unwrap();
        assert_eq!(other.spirv_size, 64);
        assert_eq!(other_blob.len(), 64);
    }

    #[test]
    fn missing_shader_hash_errors() {
        let payload = shader::encode_payload(&[ShaderEntry {
            descriptor: ShaderDescriptor {
                name_hash: shader_hashes::TRIANGLE_MESH,
                ..Default::default()
            },
            spirv: placeholder_spirv(8),
        }])
        .unwrap();

        let mut asset = Asset::new();
        asset.set_feature_flags(FeatureFlags::HASH_BASED_NAMES);
        asset.add_chunk(ChunkType::Shader, payload, "shaders");

        let mut overlay = Overlay::new();
        overlay.add_shader_replacement(0xDEAD, 0, &placeholder_spirv(8));
        assert!(overlay.apply_to_asset(&mut asset).is_err());
    }

    #[test]
    fn translation_moves_float_positions() {
        let mut asset = float_asset(2);
        let mut overlay = Overlay::new();
        overlay.add_translation_operation(10.0, 0.0, -1.0, VertexRange::ALL);
        overlay.apply_to_asset(&mut asset).unwrap();

        assert_eq!(
            floats_at(&asset, GEOMETRY_HEADER_SIZE, 3),
            vec![11.0, 2.0, 2.0]
        );
    }

    #[test]
    fn scale_then_translate_composes_in_order() {
        let mut asset = float_asset(1);
        let mut overlay = Overlay::new();
        overlay.add_scale_operation(2.0, 2.0, 2.0, VertexRange::ALL);
        overlay.add_translation_operation(1.0, 0.0, 0.0, VertexRange::ALL);
        overlay.apply_to_asset(&mut asset).unwrap();

        // (1,2,3) scaled then translated.
        assert_eq!(
            floats_at(&asset, GEOMETRY_HEADER_SIZE, 3),
            vec![3.0, 4.0, 6.0]
        );
    }

    #[test]
    fn rotation_transforms_normals_and_renormalizes() {
        let mut asset = float_asset(1);
        let mut overlay = Overlay::new();
        overlay.add_rotation_operation(
            [0.0, 0.0, 1.0],
            std::f32::consts::FRAC_PI_2,
            VertexRange::ALL,
        );
        overlay.apply_to_asset(&mut asset).unwrap();

        // Normal (0,1,0) rotated 90 degrees about Z becomes (-1,0,0).
        let normal = floats_at(&asset, GEOMETRY_HEADER_SIZE + 12, 3);
        assert!((normal[0] + 1.0).abs() < 1e-5);
        assert!(normal[1].abs() < 1e-5);
        assert!(normal[2].abs() < 1e-5);
    }

    #[test]
    fn attribute_add_and_multiply() {
        let mut asset = float_asset(1);
        let mut overlay = Overlay::new();
        overlay.add_vertex_attribute_change(AttributeModification {
            attribute_offset: 0,
            attribute_size: 12,
            vertex_index: 0,
            operation: AttributeOp::Add,
            values: [1.0, 1.0, 1.0, 0.0],
        });
        overlay.add_vertex_attribute_change(AttributeModification {
            attribute_offset: 0,
            attribute_size: 12,
            vertex_index: 0,
            operation: AttributeOp::Multiply,
            values: [2.0, 2.0, 2.0, 0.0],
        });
        overlay.apply_to_asset(&mut asset).unwrap();

        assert_eq!(
            floats_at(&asset, GEOMETRY_HEADER_SIZE, 3),
            vec![4.0, 6.0, 8.0]
        );
    }

    #[test]
    fn uv_modification_with_flip() {
        let mut asset = quantized_asset(1);
        let mut overlay = Overlay::new();
        overlay.add_uv_modification(0, 0.25, 0.25, true, false);
        overlay.apply_to_asset(&mut asset).unwrap();

        // UV sits at byte 52 in the quantized layout.
        let uv = floats_at(&asset, GEOMETRY_HEADER_SIZE + 52, 2);
        assert_eq!(uv, vec![0.75, 0.25]);
    }

    #[test]
    fn subset_color_change_covers_range_only() {
        let mut asset = quantized_asset(4);
        let mut overlay = Overlay::new();
        overlay.add_subset_color_change(1, 2, [0.0, 0.0, 0.0, 0.0]);
        overlay.apply_to_asset(&mut asset).unwrap();

        for (vertex, expected) in [
            (0, vec![0.2, 0.4, 0.6, 1.0]),
            (1, vec![0.0, 0.0, 0.0, 0.0]),
            (2, vec![0.0, 0.0, 0.0, 0.0]),
            (3, vec![0.2, 0.4, 0.6, 1.0]),
        ] {
            let offset = GEOMETRY_HEADER_SIZE + vertex * STRIDE + 36;
            assert_eq!(floats_at(&asset, offset, 4), expected, "vertex {vertex}");
        }
    }

    #[test]
    fn subset_out_of_range_errors() {
        let mut asset = quantized_asset(3);
        let mut overlay = Overlay::new();
        overlay.add_subset_color_change(2, 5, [0.0; 4]);
        assert!(overlay.apply_to_asset(&mut asset).is_err());
    }

    #[test]
    fn material_replace_swaps_payload_and_crc() {
        use taf_asset::chunks::material;

        let mut asset = quantized_asset(3);
        let original = material::encode_payload(&[taf_asset::Material::default()]);
        asset.add_chunk(ChunkType::Material, original, "material");
        let old_crc = asset.directory()[1].checksum;

        let replacement = material::encode_payload(&[taf_asset::Material {
            name: "replacement".into(),
            ..Default::default()
        }]);

        let mut overlay = Overlay::new();
        overlay.add_chunk_replacement(ChunkType::Material, &replacement);
        overlay.apply_to_asset(&mut asset).unwrap();

        let decoded =
            material::decode_payload(asset.get_chunk_data(ChunkType::Material).unwrap()).unwrap();
        assert_eq!(decoded[0].name, "replacement");
        assert_ne!(asset.directory()[1].checksum, old_crc);
        assert_eq!(asset.header().chunk_count, 2);
    }

    #[test]
    fn composability_matches_fresh_application() {
        // ShaderReplace then VertexColorChange on non-conflicting targets
        // equals applying the same ops to a fresh copy.
        let build = || {
            let mut asset = quantized_asset(3);
            let payload = shader::encode_payload(&[ShaderEntry {
                descriptor: ShaderDescriptor {
                    name_hash: shader_hashes::TRIANGLE_FRAG,
                    ..Default::default()
                },
                spirv: placeholder_spirv(8),
            }])
            .unwrap();
            asset.add_chunk(ChunkType::Shader, payload, "shaders");
            asset
        };

        let mut overlay = Overlay::new();
        overlay.add_shader_replacement(shader_hashes::TRIANGLE_FRAG, 0, &placeholder_spirv(32));
        overlay.add_vertex_color_change(2, 0.0, 0.0, 1.0, 1.0);

        let mut first = build();
        overlay.apply_to_asset(&mut first).unwrap();
        let mut second = build();
        overlay.apply_to_asset(&mut second).unwrap();

        assert_eq!(
            first.get_chunk_data(ChunkType::Geometry),
            second.get_chunk_data(ChunkType::Geometry)
        );
        assert_eq!(
            first.get_chunk_data(ChunkType::Shader),
            second.get_chunk_data(ChunkType::Shader)
        );
    }
}
