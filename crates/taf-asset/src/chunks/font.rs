//! SDF font chunk payloads.
//!
//! A font payload is a header, a glyph array, an optional kerning-pair
//! array and the raw R8 SDF atlas bytes. Rasterization happens out of
//! band; this module only defines the layout and assembles payloads from
//! pre-rasterized data.

use taf_common::{BinaryReader, BinaryWriter};

use crate::{Error, Result};

/// Serialized size of [`FontHeader`] in bytes.
pub const FONT_HEADER_SIZE: usize = 80;

/// Serialized size of one [`FontGlyph`] in bytes.
pub const FONT_GLYPH_SIZE: usize = 40;

/// Serialized size of one [`KerningPair`] in bytes.
pub const KERNING_PAIR_SIZE: usize = 12;

/// Single-channel (R8) atlas format tag.
pub const TEXTURE_FORMAT_R8: u32 = 1;

/// Font payload header with section offsets.
#[derive(Debug, Clone, Copy, Default)]
pub struct FontHeader {
    pub glyph_count: u32,
    pub texture_width: u32,
    pub texture_height: u32,
    pub texture_format: u32,
    pub sdf_range: f32,
    pub font_size: f32,
    pub ascent: f32,
    pub descent: f32,
    pub line_height: f32,
    pub first_codepoint: u32,
    pub last_codepoint: u32,
    pub kerning_pair_count: u32,
    pub glyph_data_offset: u64,
    /// Zero when the payload carries no kerning data.
    pub kerning_data_offset: u64,
    pub texture_data_offset: u64,
    pub texture_data_size: u64,
}

impl FontHeader {
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(FONT_HEADER_SIZE);
        writer.put_u32(self.glyph_count);
        writer.put_u32(self.texture_width);
        writer.put_u32(self.texture_height);
        writer.put_u32(self.texture_format);
        writer.put_f32(self.sdf_range);
        writer.put_f32(self.font_size);
        writer.put_f32(self.ascent);
        writer.put_f32(self.descent);
        writer.put_f32(self.line_height);
        writer.put_u32(self.first_codepoint);
        writer.put_u32(self.last_codepoint);
        writer.put_u32(self.kerning_pair_count);
        writer.put_u64(self.glyph_data_offset);
        writer.put_u64(self.kerning_data_offset);
        writer.put_u64(self.texture_data_offset);
        writer.put_u64(self.texture_data_size);
        debug_assert_eq!(writer.len(), FONT_HEADER_SIZE);
        writer.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);
        Ok(Self {
            glyph_count: reader.read_u32()?,
            texture_width: reader.read_u32()?,
            texture_height: reader.read_u32()?,
            texture_format: reader.read_u32()?,
            sdf_range: reader.read_f32()?,
            font_size: reader.read_f32()?,
            ascent: reader.read_f32()?,
            descent: reader.read_f32()?,
            line_height: reader.read_f32()?,
            first_codepoint: reader.read_u32()?,
            last_codepoint: reader.read_u32()?,
            kerning_pair_count: reader.read_u32()?,
            glyph_data_offset: reader.read_u64()?,
            kerning_data_offset: reader.read_u64()?,
            texture_data_offset: reader.read_u64()?,
            texture_data_size: reader.read_u64()?,
        })
    }
}

/// Metrics and atlas placement for one glyph.
#[derive(Debug, Clone, Copy, Default)]
pub struct FontGlyph {
    pub codepoint: u32,
    pub uv_x: f32,
    pub uv_y: f32,
    pub uv_width: f32,
    pub uv_height: f32,
    pub width: f32,
    pub height: f32,
    pub bearing_x: f32,
    pub bearing_y: f32,
    pub advance: f32,
}

impl FontGlyph {
    fn write(&self, writer: &mut BinaryWriter) {
        writer.put_u32(self.codepoint);
        writer.put_f32(self.uv_x);
        writer.put_f32(self.uv_y);
        writer.put_f32(self.uv_width);
        writer.put_f32(self.uv_height);
        writer.put_f32(self.width);
        writer.put_f32(self.height);
        writer.put_f32(self.bearing_x);
        writer.put_f32(self.bearing_y);
        writer.put_f32(self.advance);
    }

    fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            codepoint: reader.read_u32()?,
            uv_x: reader.read_f32()?,
            uv_y: reader.read_f32()?,
            uv_width: reader.read_f32()?,
            uv_height: reader.read_f32()?,
            width: reader.read_f32()?,
            height: reader.read_f32()?,
            bearing_x: reader.read_f32()?,
            bearing_y: reader.read_f32()?,
            advance: reader.read_f32()?,
        })
    }
}

/// Kerning adjustment between a pair of codepoints.
#[derive(Debug, Clone, Copy)]
pub struct KerningPair {
    pub first: u32,
    pub second: u32,
    pub adjustment: f32,
}

/// Assemble a font payload from pre-rasterized pieces.
///
/// `header` offsets are recomputed here; callers fill in metrics and
/// codepoint range only.
pub fn encode_payload(
    mut header: FontHeader,
    glyphs: &[FontGlyph],
    kerning: &[KerningPair],
    atlas: &[u8],
) -> Result<Vec<u8>> {
    let expected_atlas = header.texture_width as usize * header.texture_height as usize;
    if atlas.len() != expected_atlas {
        return Err(Error::Validation(format!(
            "atlas is {} bytes, texture is {}x{} R8 = {expected_atlas}",
            atlas.len(),
            header.texture_width,
            header.texture_height
        )));
    }

    header.glyph_count = glyphs.len() as u32;
    header.kerning_pair_count = kerning.len() as u32;
    header.glyph_data_offset = FONT_HEADER_SIZE as u64;
    let glyphs_end = FONT_HEADER_SIZE + glyphs.len() * FONT_GLYPH_SIZE;
    header.kerning_data_offset = if kerning.is_empty() {
        0
    } else {
        glyphs_end as u64
    };
    header.texture_data_offset = (glyphs_end + kerning.len() * KERNING_PAIR_SIZE) as u64;
    header.texture_data_size = atlas.len() as u64;

    let mut writer =
        BinaryWriter::with_capacity(header.texture_data_offset as usize + atlas.len());
    writer.put_bytes(&header.encode());
    for glyph in glyphs {
        glyph.write(&mut writer);
    }
    for pair in kerning {
        writer.put_u32(pair.first);
        writer.put_u32(pair.second);
        writer.put_f32(pair.adjustment);
    }
    writer.put_bytes(atlas);
    Ok(writer.into_bytes())
}

/// A decoded view of a font payload.
#[derive(Debug)]
pub struct FontChunk<'a> {
    pub header: FontHeader,
    pub glyphs: Vec<FontGlyph>,
    pub kerning: Vec<KerningPair>,
    payload: &'a [u8],
}

impl<'a> FontChunk<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        if payload.len() < FONT_HEADER_SIZE {
            return Err(Error::Validation(format!(
                "font payload too small: {} bytes",
                payload.len()
            )));
        }
        let header = FontHeader::decode(payload)?;

        let atlas_end = header.texture_data_offset + header.texture_data_size;
        if atlas_end > payload.len() as u64 {
            return Err(Error::Validation(format!(
                "font atlas window [{}, {atlas_end}) exceeds payload size {}",
                header.texture_data_offset,
                payload.len()
            )));
        }

        let mut reader = BinaryReader::new_at(payload, header.glyph_data_offset as usize);
        let glyphs: Vec<FontGlyph> = (0..header.glyph_count)
            .map(|_| FontGlyph::read(&mut reader))
            .collect::<Result<_>>()?;

        let mut kerning = Vec::with_capacity(header.kerning_pair_count as usize);
        if header.kerning_data_offset != 0 {
            let mut reader = BinaryReader::new_at(payload, header.kerning_data_offset as usize);
            for _ in 0..header.kerning_pair_count {
                kerning.push(KerningPair {
                    first: reader.read_u32()?,
                    second: reader.read_u32()?,
                    adjustment: reader.read_f32()?,
                });
            }
        }

        Ok(Self {
            header,
            glyphs,
            kerning,
            payload,
        })
    }

    /// The raw R8 atlas bytes.
    pub fn atlas(&self) -> &'a [u8] {
        let start = self.header.texture_data_offset as usize;
        &self.payload[start..start + self.header.texture_data_size as usize]
    }

    /// Find a glyph by codepoint.
    pub fn glyph(&self, codepoint: u32) -> Option<&FontGlyph> {
        self.glyphs.iter().find(|g| g.codepoint == codepoint)
    }
}
