//! Overlay builder and file I/O.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use taf_asset::{ChunkType, FeatureFlags};

use crate::format::{
    AttributeModification, AttributeOp, OperationType, OverlayHeader, OverlayOperation,
    SubsetModification, TargetAsset, TransformationData, ALL_VERTICES, OVERLAY_HEADER_SIZE,
    OVERLAY_OPERATION_SIZE, TARGET_ASSET_SIZE,
};
use crate::{Error, Result};

/// Inclusive-of-start vertex range for transform operations.
#[derive(Debug, Clone, Copy)]
pub struct VertexRange {
    pub start: u32,
    /// Number of vertices, or [`ALL_VERTICES`] for the whole buffer.
    pub count: u32,
}

impl VertexRange {
    /// Every vertex in the target geometry.
    pub const ALL: Self = Self {
        start: 0,
        count: ALL_VERTICES,
    };

    pub const fn new(start: u32, count: u32) -> Self {
        Self { start, count }
    }
}

/// A TAFO overlay: targets, typed operations and their data blob.
///
/// Operations accumulate in declaration order, which is also their
/// application order.
#[derive(Debug, Clone, Default)]
pub struct Overlay {
    header: OverlayHeader,
    targets: Vec<TargetAsset>,
    operations: Vec<OverlayOperation>,
    operation_data: Vec<u8>,
}

impl Overlay {
    /// Create an empty overlay requiring hash-based names on the target.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&self) -> &OverlayHeader {
        &self.header
    }

    pub fn targets(&self) -> &[TargetAsset] {
        &self.targets
    }

    pub fn operations(&self) -> &[OverlayOperation] {
        &self.operations
    }

    pub fn operation_data(&self) -> &[u8] {
        &self.operation_data
    }

    pub fn set_creator(&mut self, creator: &str) {
        self.header.creator = creator.to_string();
    }

    pub fn set_description(&mut self, description: &str) {
        self.header.description = description.to_string();
    }

    /// Record a target asset. The hash stays zero until application.
    pub fn add_target_asset(&mut self, asset_path: &str, version_requirement: &str) {
        self.targets.push(TargetAsset {
            asset_path: asset_path.to_string(),
            asset_hash: 0,
            version_requirement: version_requirement.to_string(),
            required_features: FeatureFlags::HASH_BASED_NAMES.bits() as u32,
        });
        self.header.target_count = self.targets.len() as u32;
    }

    fn push_operation(
        &mut self,
        operation_type: OperationType,
        target_chunk_type: u32,
        target_hash: u64,
        replacement_hash: u64,
        data: &[u8],
    ) {
        let data_offset = self.operation_data.len() as u64;
        self.operation_data.extend_from_slice(data);
        self.operations.push(OverlayOperation {
            operation_type,
            target_chunk_type,
            target_hash,
            replacement_hash,
            data_offset,
            data_size: data.len() as u64,
            flags: 0,
        });
        self.header.operation_count = self.operations.len() as u32;
    }

    /// Replace the SPIR-V of the shader whose name hash matches.
    pub fn add_shader_replacement(
        &mut self,
        target_shader_hash: u64,
        replacement_shader_hash: u64,
        spirv: &[u8],
    ) {
        self.push_operation(
            OperationType::ShaderReplace,
            ChunkType::SHDR,
            target_shader_hash,
            replacement_shader_hash,
            spirv,
        );
    }

    /// Set one vertex's color. The color attribute offset is derived from
    /// the target's feature flags at application time.
    pub fn add_vertex_color_change(&mut self, vertex_index: u32, r: f32, g: f32, b: f32, a: f32) {
        let mut data = Vec::with_capacity(16);
        for v in [r, g, b, a] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        // The hash field carries the vertex index for this operation.
        self.push_operation(
            OperationType::VertexColorChange,
            ChunkType::GEOM,
            vertex_index as u64,
            0,
            &data,
        );
    }

    fn push_transform(&mut self, kind: OperationType, data: TransformationData) {
        self.push_operation(kind, ChunkType::GEOM, 0, 0, &data.encode());
    }

    /// Scale positions (and normals) over a vertex range.
    pub fn add_scale_operation(&mut self, sx: f32, sy: f32, sz: f32, range: VertexRange) {
        let mut transform = TransformationData::identity();
        transform.matrix[0] = sx;
        transform.matrix[5] = sy;
        transform.matrix[10] = sz;
        transform.flags |= TransformationData::TRANSFORM_NORMALS;
        transform.vertex_start = range.start;
        transform.vertex_count = range.count;
        self.push_transform(OperationType::GeometryScale, transform);
    }

    /// Rotate positions and normals about an axis by `angle` radians,
    /// using the Rodrigues rotation formula.
    pub fn add_rotation_operation(&mut self, axis: [f32; 3], angle: f32, range: VertexRange) {
        let len = (axis[0] * axis[0] + axis[1] * axis[1] + axis[2] * axis[2]).sqrt();
        let (x, y, z) = if len > 0.0 {
            (axis[0] / len, axis[1] / len, axis[2] / len)
        } else {
            (0.0, 0.0, 1.0)
        };
        let (sin, cos) = angle.sin_cos();
        let ic = 1.0 - cos;

        let mut transform = TransformationData::identity();
        transform.matrix[0] = cos + x * x * ic;
        transform.matrix[1] = x * y * ic - z * sin;
        transform.matrix[2] = x * z * ic + y * sin;
        transform.matrix[4] = y * x * ic + z * sin;
        transform.matrix[5] = cos + y * y * ic;
        transform.matrix[6] = y * z * ic - x * sin;
        transform.matrix[8] = z * x * ic - y * sin;
        transform.matrix[9] = z * y * ic + x * sin;
        transform.matrix[10] = cos + z * z * ic;
        transform.flags |= TransformationData::TRANSFORM_NORMALS;
        transform.vertex_start = range.start;
        transform.vertex_count = range.count;
        self.push_transform(OperationType::GeometryRotate, transform);
    }

    /// Translate positions over a vertex range.
    pub fn add_translation_operation(&mut self, tx: f32, ty: f32, tz: f32, range: VertexRange) {
        let mut transform = TransformationData::identity();
        transform.matrix[3] = tx;
        transform.matrix[7] = ty;
        transform.matrix[11] = tz;
        transform.vertex_start = range.start;
        transform.vertex_count = range.count;
        self.push_transform(OperationType::GeometryTranslate, transform);
    }

    /// Apply an arbitrary row-major 4x4 matrix over a vertex range.
    pub fn add_transform_operation(&mut self, matrix: [f32; 16], flags: u32, range: VertexRange) {
        self.push_transform(
            OperationType::GeometryTransform,
            TransformationData {
                matrix,
                flags,
                vertex_start: range.start,
                vertex_count: range.count,
            },
        );
    }

    /// Replace one vertex's position (3 floats at byte 0).
    pub fn add_vertex_position_change(&mut self, vertex_index: u32, x: f32, y: f32, z: f32) {
        let modification = AttributeModification {
            attribute_offset: 0,
            attribute_size: 12,
            vertex_index,
            operation: AttributeOp::Replace,
            values: [x, y, z, 0.0],
        };
        self.push_operation(
            OperationType::VertexPositionChange,
            ChunkType::GEOM,
            vertex_index as u64,
            0,
            &modification.encode(),
        );
    }

    /// Apply an explicit attribute modification.
    pub fn add_vertex_attribute_change(&mut self, modification: AttributeModification) {
        self.push_operation(
            OperationType::VertexAttributeChange,
            ChunkType::GEOM,
            modification.vertex_index as u64,
            0,
            &modification.encode(),
        );
    }

    /// Set one vertex's normal; when `normalize` is true the value is
    /// L2-normalized before writing. The normal offset is derived from
    /// the target's feature flags at application time.
    pub fn add_normal_change(
        &mut self,
        vertex_index: u32,
        nx: f32,
        ny: f32,
        nz: f32,
        normalize: bool,
    ) {
        let modification = AttributeModification {
            attribute_offset: 0,
            attribute_size: 12,
            vertex_index,
            operation: if normalize {
                AttributeOp::Normalize
            } else {
                AttributeOp::Replace
            },
            values: [nx, ny, nz, 0.0],
        };
        self.push_operation(
            OperationType::NormalRecalculation,
            ChunkType::GEOM,
            vertex_index as u64,
            0,
            &modification.encode(),
        );
    }

    /// Set one vertex's UV. Flips resolve to `1 - u` / `1 - v` at
    /// application time; the UV offset is derived from feature flags.
    pub fn add_uv_modification(
        &mut self,
        vertex_index: u32,
        u: f32,
        v: f32,
        flip_u: bool,
        flip_v: bool,
    ) {
        let modification = AttributeModification {
            attribute_offset: 0,
            attribute_size: 8,
            vertex_index,
            operation: AttributeOp::Replace,
            values: [u, v, flip_u as u32 as f32, flip_v as u32 as f32],
        };
        self.push_operation(
            OperationType::UvModification,
            ChunkType::GEOM,
            vertex_index as u64,
            0,
            &modification.encode(),
        );
    }

    /// Set the color of every vertex in `[start, start + count)`.
    pub fn add_subset_color_change(&mut self, start: u32, count: u32, rgba: [f32; 4]) {
        let subset = SubsetModification {
            vertex_start: start,
            vertex_count: count,
            modification: AttributeModification {
                attribute_offset: 0,
                attribute_size: 16,
                vertex_index: ALL_VERTICES,
                operation: AttributeOp::Replace,
                values: rgba,
            },
        };
        self.push_operation(
            OperationType::VertexSubset,
            ChunkType::GEOM,
            0,
            0,
            &subset.encode(),
        );
    }

    /// Replace an entire chunk payload under its original tag.
    pub fn add_chunk_replacement(&mut self, tag: ChunkType, payload: &[u8]) {
        let kind = match tag {
            ChunkType::Material => OperationType::MaterialReplace,
            ChunkType::Geometry => OperationType::GeometryModify,
            _ => OperationType::ChunkReplace,
        };
        self.push_operation(kind, tag.as_u32(), 0, 0, payload);
    }

    /// Serialize: header, targets, operations, data blob.
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        log::info!("saving overlay to {}", path.display());

        self.header.total_size = (OVERLAY_HEADER_SIZE
            + self.targets.len() * TARGET_ASSET_SIZE
            + self.operations.len() * OVERLAY_OPERATION_SIZE
            + self.operation_data.len()) as u64;

        let mut file = File::create(path)?;
        file.write_all(&self.header.encode())
            .map_err(|e| Error::Write(format!("failed to write overlay header: {e}")))?;
        for target in &self.targets {
            file.write_all(&target.encode())
                .map_err(|e| Error::Write(format!("failed to write target record: {e}")))?;
        }
        for op in &self.operations {
            file.write_all(&op.encode())
                .map_err(|e| Error::Write(format!("failed to write operation record: {e}")))?;
        }
        file.write_all(&self.operation_data)
            .map_err(|e| Error::Write(format!("failed to write operation data: {e}")))?;
        file.flush()?;

        log::info!(
            "overlay saved: {} bytes, {} targets, {} operations",
            self.header.total_size,
            self.header.target_count,
            self.header.operation_count
        );
        Ok(())
    }

    /// Load an overlay, validating the header and section layout.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::info!("loading overlay from {}", path.display());

        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < OVERLAY_HEADER_SIZE as u64 {
            return Err(Error::Validation(format!(
                "file too small for overlay header: {file_size} bytes"
            )));
        }

        let mut bytes = Vec::with_capacity(file_size as usize);
        file.read_to_end(&mut bytes)?;

        let header = OverlayHeader::decode(&bytes)?;
        header.validate(file_size, &bytes)?;

        let sections = OVERLAY_HEADER_SIZE
            + header.target_count as usize * TARGET_ASSET_SIZE
            + header.operation_count as usize * OVERLAY_OPERATION_SIZE;
        if bytes.len() < sections {
            return Err(Error::Validation(format!(
                "overlay is {} bytes but targets and operations need {sections}",
                bytes.len()
            )));
        }

        let mut offset = OVERLAY_HEADER_SIZE;
        let mut targets = Vec::with_capacity(header.target_count as usize);
        for _ in 0..header.target_count {
            targets.push(TargetAsset::decode(&bytes[offset..])?);
            offset += TARGET_ASSET_SIZE;
        }

        let mut operations = Vec::with_capacity(header.operation_count as usize);
        for _ in 0..header.operation_count {
            operations.push(OverlayOperation::decode(&bytes[offset..])?);
            offset += OVERLAY_OPERATION_SIZE;
        }

        let operation_data = bytes[offset..].to_vec();

        for (i, op) in operations.iter().enumerate() {
            let end = op.data_offset + op.data_size;
            if end > operation_data.len() as u64 {
                return Err(Error::Validation(format!(
                    "operation {i} data window [{}, {end}) exceeds blob size {}",
                    op.data_offset,
                    operation_data.len()
                )));
            }
        }

        Ok(Self {
            header,
            targets,
            operations,
            operation_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.tafo");

        let mut overlay = Overlay::new();
        overlay.add_target_asset("assets/cube.taf", "^1.0.0");
        overlay.add_vertex_color_change(1, 1.0, 0.0, 0.0, 1.0);
        overlay.add_scale_operation(2.0, 2.0, 2.0, VertexRange::ALL);
        overlay.save_to_file(&path).unwrap();

        let loaded = Overlay::load_from_file(&path).unwrap();
        assert_eq!(loaded.targets().len(), 1);
        assert_eq!(loaded.targets()[0].asset_path, "assets/cube.taf");
        assert_eq!(loaded.operations().len(), 2);
        assert_eq!(
            loaded.operations()[0].operation_type,
            OperationType::VertexColorChange
        );
        assert_eq!(loaded.operations()[0].target_hash, 1);
        assert_eq!(loaded.operations()[0].data_size, 16);
        assert_eq!(
            loaded.operations()[1].operation_type,
            OperationType::GeometryScale
        );

        let expected = (OVERLAY_HEADER_SIZE
            + TARGET_ASSET_SIZE
            + 2 * OVERLAY_OPERATION_SIZE
            + 16
            + crate::format::TRANSFORMATION_DATA_SIZE) as u64;
        assert_eq!(loaded.header().total_size, expected);
    }

    #[test]
    fn data_windows_accumulate() {
        let mut overlay = Overlay::new();
        overlay.add_shader_replacement(0xA, 0xB, &[0u8; 64]);
        overlay.add_vertex_color_change(0, 0.0, 1.0, 0.0, 1.0);

        assert_eq!(overlay.operations()[0].data_offset, 0);
        assert_eq!(overlay.operations()[0].data_size, 64);
        assert_eq!(overlay.operations()[1].data_offset, 64);
        assert_eq!(overlay.operations()[1].data_size, 16);
        assert_eq!(overlay.operation_data().len(), 80);
    }

    #[test]
    fn rotation_matrix_is_orthonormal() {
        let mut overlay = Overlay::new();
        overlay.add_rotation_operation([0.0, 0.0, 1.0], std::f32::consts::FRAC_PI_2, VertexRange::ALL);

        let data = overlay.operations()[0]
            .data(overlay.operation_data())
            .unwrap();
        let transform = TransformationData::decode(data).unwrap();

        // 90 degrees about Z maps +X to +Y.
        let m = &transform.matrix;
        let x = [m[0], m[4], m[8]];
        assert!(x[0].abs() < 1e-6);
        assert!((x[1] - 1.0).abs() < 1e-6);
        assert!(x[2].abs() < 1e-6);
    }

    #[test]
    fn truncated_overlay_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.tafo");

        let mut overlay = Overlay::new();
        overlay.add_target_asset("a.taf", "^1.0.0");
        overlay.save_to_file(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 8]).unwrap();

        assert!(Overlay::load_from_file(&path).is_err());
    }
}
