//! taf - command-line tool for building and inspecting TAF assets.
//!
//! This is the main entry point for the TAF command-line application.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use taf::asset::chunks::{font, geometry, material, shader};
use taf::asset::{
    FontGlyph, FontHeader, GeometryHeader, Material, MaterialFlags, PrimitiveType, RenderMode,
    ShaderDescriptor, ShaderEntry, ShaderStage, Vec3Q, VertexFormat,
};
use taf::audio::presets::{self, DistortionKind, FilterKind, Waveform};
use taf::audio::StreamFormat;
use taf::common::hash::shader_hashes;
use taf::prelude::*;

/// taf - interactive asset format tool
#[derive(Parser)]
#[command(name = "taf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the header, features and chunk directory of a TAF file
    Inspect {
        /// Input TAF file
        input: PathBuf,
    },

    /// Generate a demo master asset (cube geometry, material, shaders, font)
    GenMaster {
        /// Output TAF file
        output: PathBuf,

        /// Compiled mesh shader module (.spv)
        #[arg(long)]
        mesh_spirv: Option<PathBuf>,

        /// Compiled fragment shader module (.spv)
        #[arg(long)]
        frag_spirv: Option<PathBuf>,
    },

    /// Generate an overlay that recolors a vertex and swaps a shader
    GenOverlay {
        /// Output TAFO file
        output: PathBuf,

        /// Target asset path recorded in the overlay
        #[arg(long, default_value = "assets/cube.taf")]
        target: String,

        /// Vertex index to recolor
        #[arg(long, default_value_t = 1)]
        vertex: u32,

        /// Replacement fragment shader module (.spv)
        #[arg(long)]
        frag_spirv: Option<PathBuf>,
    },

    /// Apply an overlay to an asset and save the result
    Apply {
        /// Input TAF file
        asset: PathBuf,

        /// Input TAFO file
        overlay: PathBuf,

        /// Output TAF file
        output: PathBuf,
    },

    /// Generate a waveform audio asset
    GenAudio {
        /// Output TAF file
        output: PathBuf,

        /// Oscillator frequency in Hz
        #[arg(short, long, default_value_t = 440.0)]
        frequency: f32,

        /// Duration in seconds
        #[arg(short, long, default_value_t = 1.0)]
        duration: f32,

        /// Waveform: sine, square, saw, triangle, noise
        #[arg(short, long, default_value = "sine")]
        waveform: String,
    },

    /// Generate a processing demo audio asset (mixer, adsr, filter, distortion)
    GenAudioDemo {
        /// Output TAF file
        output: PathBuf,

        /// Demo graph: mixer, adsr, filter, distortion
        #[arg(long, default_value = "mixer")]
        demo: String,

        /// Filter response for the filter demo: lowpass, highpass, bandpass
        #[arg(long, default_value = "lowpass")]
        filter_kind: String,

        /// Distortion algorithm: hardclip, softclip, foldback, bitcrush,
        /// overdrive, beeper
        #[arg(long, default_value = "hardclip")]
        distortion_kind: String,
    },

    /// Generate a chunked streaming audio asset
    GenAudioStream {
        /// Output TAF file
        output: PathBuf,

        /// Tone frequency in Hz
        #[arg(short, long, default_value_t = 440.0)]
        frequency: f32,

        /// Duration in seconds
        #[arg(short, long, default_value_t = 10.0)]
        duration: f32,

        /// Streaming chunk length in milliseconds
        #[arg(long, default_value_t = 500)]
        chunk_ms: u32,
    },

    /// Preload chunks through the streaming loader and print cache stats
    Preload {
        /// Input TAF file
        input: PathBuf,

        /// Chunk indices; all chunks when omitted
        indices: Vec<u32>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let start = Instant::now();

    match cli.command {
        Commands::Inspect { input } => cmd_inspect(&input)?,
        Commands::GenMaster {
            output,
            mesh_spirv,
            frag_spirv,
        } => cmd_gen_master(&output, mesh_spirv.as_deref(), frag_spirv.as_deref())?,
        Commands::GenOverlay {
            output,
            target,
            vertex,
            frag_spirv,
        } => cmd_gen_overlay(&output, &target, vertex, frag_spirv.as_deref())?,
        Commands::Apply {
            asset,
            overlay,
            output,
        } => cmd_apply(&asset, &overlay, &output)?,
        Commands::GenAudio {
            output,
            frequency,
            duration,
            waveform,
        } => cmd_gen_audio(&output, frequency, duration, &waveform)?,
        Commands::GenAudioDemo {
            output,
            demo,
            filter_kind,
            distortion_kind,
        } => cmd_gen_audio_demo(&output, &demo, &filter_kind, &distortion_kind)?,
        Commands::GenAudioStream {
            output,
            frequency,
            duration,
            chunk_ms,
        } => cmd_gen_audio_stream(&output, frequency, duration, chunk_ms)?,
        Commands::Preload { input, indices } => cmd_preload(&input, &indices)?,
    }

    log::debug!("done in {:.2?}", start.elapsed());
    Ok(())
}

fn cmd_inspect(input: &Path) -> Result<()> {
    let asset = Asset::load_from_file_safe(input)
        .with_context(|| format!("failed to load {}", input.display()))?;
    print!("{asset}");
    Ok(())
}

fn load_spirv(path: Option<&Path>, fallback_words: usize) -> Result<Vec<u8>> {
    match path {
        Some(path) => {
            let bytes =
                fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            shader::validate_spirv(&bytes)
                .with_context(|| format!("{} is not a SPIR-V module", path.display()))?;
            Ok(bytes)
        }
        None => Ok(shader::placeholder_spirv(fallback_words)),
    }
}

/// A 76-byte demo vertex: quantized position, normal, color, uv, tangent.
fn cube_vertex(
    position: [i64; 3],
    normal: [f32; 3],
    color: [f32; 4],
    uv: [f32; 2],
    tangent: [f32; 4],
) -> Vec<u8> {
    let mut writer = BinaryWriter::with_capacity(76);
    for q in position {
        writer.put_i64(q);
    }
    for v in normal {
        writer.put_f32(v);
    }
    for v in color {
        writer.put_f32(v);
    }
    for v in uv {
        writer.put_f32(v);
    }
    for v in tangent {
        writer.put_f32(v);
    }
    writer.into_bytes()
}

fn cube_geometry_payload() -> Result<Vec<u8>> {
    // A 10 cm cube in quantized units, one colored face per axis. Each
    // face contributes four vertices spanning the two axes orthogonal to
    // its normal.
    const Q: i64 = Vec3Q::UNITS_PER_METER / 10;
    let faces: [([f32; 3], [f32; 4], [f32; 4]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0, 1.0], [1.0, 0.0, 0.0, 1.0]),
        ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0, 1.0], [-1.0, 0.0, 0.0, 1.0]),
        ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0, 1.0], [1.0, 0.0, 0.0, 1.0]),
        ([0.0, -1.0, 0.0], [1.0, 1.0, 0.0, 1.0], [1.0, 0.0, 0.0, 1.0]),
        ([1.0, 0.0, 0.0], [1.0, 0.0, 1.0, 1.0], [0.0, 0.0, 1.0, 1.0]),
        ([-1.0, 0.0, 0.0], [0.0, 1.0, 1.0, 1.0], [0.0, 0.0, -1.0, 1.0]),
    ];
    let corners = [[0.0f32, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    for (face, (normal, color, tangent)) in faces.iter().enumerate() {
        let base = (face * 4) as u32;
        let fixed_axis = normal
            .iter()
            .position(|&n| n != 0.0)
            .expect("face normals are axis-aligned");
        let free: Vec<usize> = (0..3).filter(|&a| a != fixed_axis).collect();

        for (corner, uv) in corners.iter().enumerate() {
            let mut position = [0i64; 3];
            position[fixed_axis] = normal[fixed_axis] as i64 * Q;
            position[free[0]] = if corner == 1 || corner == 2 { Q } else { -Q };
            position[free[1]] = if corner >= 2 { Q } else { -Q };
            vertices.extend_from_slice(&cube_vertex(position, *normal, *color, *uv, *tangent));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    let header = GeometryHeader {
        vertex_count: 24,
        index_count: indices.len() as u32,
        vertex_stride: 76,
        vertex_format: VertexFormat::POSITION_3D
            | VertexFormat::NORMAL
            | VertexFormat::COLOR
            | VertexFormat::TEXCOORD0
            | VertexFormat::TANGENT,
        bounds_min: Vec3Q::new(-Q, -Q, -Q),
        bounds_max: Vec3Q::new(Q, Q, Q),
        lod_distance: 1000.0,
        lod_level: 0,
        render_mode: RenderMode::MeshShader,
        ms_max_vertices: 24,
        ms_max_primitives: 12,
        ms_workgroup_size: [1, 1, 1],
        ms_primitive_type: PrimitiveType::Triangles,
        ms_flags: 0,
    };
    Ok(geometry::encode_payload(&header, &vertices, &indices)?)
}

fn demo_font_payload() -> Result<Vec<u8>> {
    // Placeholder ASCII atlas: real metrics, flat mid-gray SDF.
    let texture_size = 128u32;
    let glyphs: Vec<FontGlyph> = (32u32..=126)
        .map(|codepoint| FontGlyph {
            codepoint,
            advance: 18.0,
            width: 16.0,
            height: 24.0,
            bearing_y: 24.0,
            ..Default::default()
        })
        .collect();
    let atlas = vec![127u8; (texture_size * texture_size) as usize];
    let header = FontHeader {
        texture_width: texture_size,
        texture_height: texture_size,
        texture_format: font::TEXTURE_FORMAT_R8,
        sdf_range: 4.0,
        font_size: 32.0,
        ascent: 25.6,
        descent: 6.4,
        line_height: 38.4,
        first_codepoint: 32,
        last_codepoint: 126,
        ..Default::default()
    };
    Ok(font::encode_payload(header, &glyphs, &[], &atlas)?)
}

fn cmd_gen_master(
    output: &Path,
    mesh_spirv: Option<&Path>,
    frag_spirv: Option<&Path>,
) -> Result<()> {
    let mut asset = Asset::new();
    asset.set_creator("taf asset compiler");
    asset.set_description("Demo cube with mesh shaders and SDF font");
    asset.set_feature_flags(
        FeatureFlags::QUANTIZED_COORDS
            | FeatureFlags::MESH_SHADERS
            | FeatureFlags::EMBEDDED_SHADERS
            | FeatureFlags::HASH_BASED_NAMES
            | FeatureFlags::PBR_MATERIALS
            | FeatureFlags::SDF_FONT,
    );

    asset.add_chunk(
        ChunkType::Geometry,
        cube_geometry_payload()?,
        "cube_geometry",
    );

    asset.add_chunk(
        ChunkType::Material,
        material::encode_payload(&[Material {
            name: "cube_material".into(),
            roughness: 0.8,
            flags: MaterialFlags::DOUBLE_SIDED,
            ..Default::default()
        }]),
        "cube_material",
    );

    let entries = vec![
        ShaderEntry {
            descriptor: ShaderDescriptor {
                name_hash: shader_hashes::TRIANGLE_MESH,
                entry_point_hash: shader_hashes::MAIN_ENTRY,
                stage: ShaderStage::MeshShader,
                max_vertices: 24,
                max_primitives: 12,
                workgroup_size: [1, 1, 1],
                ..Default::default()
            },
            spirv: load_spirv(mesh_spirv, 64)?,
        },
        ShaderEntry {
            descriptor: ShaderDescriptor {
                name_hash: shader_hashes::DATA_DRIVEN_FRAG,
                entry_point_hash: shader_hashes::MAIN_ENTRY,
                stage: ShaderStage::Fragment,
                ..Default::default()
            },
            spirv: load_spirv(frag_spirv, 32)?,
        },
    ];
    asset.add_chunk(
        ChunkType::Shader,
        shader::encode_payload(&entries)?,
        "hash_based_shaders",
    );

    asset.add_chunk(ChunkType::Font, demo_font_payload()?, "demo_sdf_font");

    asset
        .save_to_file(output)
        .with_context(|| format!("failed to save {}", output.display()))?;
    println!(
        "wrote {} ({} chunks, {} bytes)",
        output.display(),
        asset.get_chunk_count(),
        asset.header().total_size
    );
    Ok(())
}

fn cmd_gen_overlay(
    output: &Path,
    target: &str,
    vertex: u32,
    frag_spirv: Option<&Path>,
) -> Result<()> {
    let mut overlay = Overlay::new();
    overlay.set_creator("taf overlay compiler");
    overlay.set_description("Recolor a vertex and swap the fragment shader");
    overlay.add_target_asset(target, "^1.0.0");
    overlay.add_shader_replacement(
        shader_hashes::DATA_DRIVEN_FRAG,
        shader_hashes::TRIANGLE_FRAG,
        &load_spirv(frag_spirv, 64)?,
    );
    overlay.add_vertex_color_change(vertex, 1.0, 0.0, 0.0, 1.0);

    overlay
        .save_to_file(output)
        .with_context(|| format!("failed to save {}", output.display()))?;
    println!(
        "wrote {} ({} operations)",
        output.display(),
        overlay.operations().len()
    );
    Ok(())
}

fn cmd_apply(asset_path: &Path, overlay_path: &Path, output: &Path) -> Result<()> {
    let mut asset = Asset::load_from_file_safe(asset_path)
        .with_context(|| format!("failed to load {}", asset_path.display()))?;
    let overlay = Overlay::load_from_file(overlay_path)
        .with_context(|| format!("failed to load {}", overlay_path.display()))?;

    if !overlay.targets_asset(&asset) {
        bail!("overlay does not target {}", asset_path.display());
    }
    overlay.apply_to_asset(&mut asset)?;
    asset
        .save_to_file(output)
        .with_context(|| format!("failed to save {}", output.display()))?;
    println!("applied {} operations", overlay.operations().len());
    Ok(())
}

fn parse_waveform(name: &str) -> Result<Waveform> {
    Ok(match name {
        "sine" => Waveform::Sine,
        "square" => Waveform::Square,
        "saw" => Waveform::Saw,
        "triangle" => Waveform::Triangle,
        "noise" => Waveform::Noise,
        other => bail!("unknown waveform {other:?}"),
    })
}

fn cmd_gen_audio(output: &Path, frequency: f32, duration: f32, waveform: &str) -> Result<()> {
    let waveform = parse_waveform(waveform)?;
    let payload = presets::sine_wave_graph(frequency, duration, waveform)?;

    let mut asset = Asset::new();
    asset.set_creator("taf audio compiler");
    asset.set_description("Waveform synthesis graph");
    asset.set_feature_flags(FeatureFlags::AUDIO | FeatureFlags::HASH_BASED_NAMES);
    asset.add_chunk(ChunkType::Audio, payload, "waveform_audio");
    asset
        .save_to_file(output)
        .with_context(|| format!("failed to save {}", output.display()))?;
    println!(
        "wrote {} ({frequency} Hz {waveform:?}, {duration} s)",
        output.display()
    );
    Ok(())
}

fn parse_filter_kind(name: &str) -> Result<FilterKind> {
    Ok(match name {
        "lowpass" => FilterKind::Lowpass,
        "highpass" => FilterKind::Highpass,
        "bandpass" => FilterKind::Bandpass,
        other => bail!("unknown filter kind {other:?}"),
    })
}

fn parse_distortion_kind(name: &str) -> Result<DistortionKind> {
    Ok(match name {
        "hardclip" => DistortionKind::HardClip,
        "softclip" => DistortionKind::SoftClip,
        "foldback" => DistortionKind::Foldback,
        "bitcrush" => DistortionKind::BitCrush,
        "overdrive" => DistortionKind::Overdrive,
        "beeper" => DistortionKind::Beeper,
        other => bail!("unknown distortion kind {other:?}"),
    })
}

fn cmd_gen_audio_demo(
    output: &Path,
    demo: &str,
    filter_kind: &str,
    distortion_kind: &str,
) -> Result<()> {
    let (payload, chunk_name, description) = match demo {
        "mixer" => (
            presets::mixer_demo_graph()?,
            "mixer_demo_audio".to_string(),
            "Mixer demo: three oscillators into a three-channel mixer".to_string(),
        ),
        "adsr" => (
            presets::adsr_envelope_graph()?,
            "adsr_demo_audio".to_string(),
            "ADSR envelope demonstration".to_string(),
        ),
        "filter" => {
            let kind = parse_filter_kind(filter_kind)?;
            (
                presets::filter_sweep_graph(kind)?,
                format!("filter_{}_demo_audio", kind.name()),
                format!("Filter demonstration: {} with envelope sweep", kind.name()),
            )
        }
        "distortion" => {
            let kind = parse_distortion_kind(distortion_kind)?;
            (
                presets::distortion_graph(kind)?,
                format!("distortion_{}_demo_audio", kind.name()),
                format!("Distortion demonstration: {}", kind.name()),
            )
        }
        other => bail!("unknown demo {other:?} (expected mixer, adsr, filter or distortion)"),
    };

    let mut asset = Asset::new();
    asset.set_creator("taf audio compiler");
    asset.set_description(&description);
    asset.set_feature_flags(FeatureFlags::AUDIO | FeatureFlags::HASH_BASED_NAMES);
    asset.add_chunk(ChunkType::Audio, payload, &chunk_name);
    asset
        .save_to_file(output)
        .with_context(|| format!("failed to save {}", output.display()))?;
    println!("wrote {} ({demo} demo)", output.display());
    Ok(())
}

fn cmd_gen_audio_stream(output: &Path, frequency: f32, duration: f32, chunk_ms: u32) -> Result<()> {
    let sample_rate = 48_000u32;
    let samples = presets::sine_samples(frequency, duration, sample_rate, 0.8);
    let samples_per_chunk = (sample_rate * chunk_ms / 1000).max(1);
    let total_samples = samples.len() as u32;

    // The metadata graph describes the stream; the audio bytes ride in
    // separate directory chunks rather than in the payload tail.
    let metadata = presets::streaming_graph(
        "main_stream",
        sample_rate,
        1,
        32,
        0,
        samples_per_chunk,
        StreamFormat::Float,
        Vec::new(),
    )?;

    let mut writer = ChunkedWriter::begin(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    writer.add_metadata_chunk(metadata, "audio_metadata")?;

    let chunk_count = total_samples.div_ceil(samples_per_chunk);
    for i in 0..chunk_count {
        let start = (i * samples_per_chunk) as usize;
        let end = (start + samples_per_chunk as usize).min(samples.len());
        let bytes: Vec<u8> = samples[start..end]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        writer.add_audio_chunk(bytes, i)?;
    }
    writer.finalize()?;
    println!(
        "wrote {} ({chunk_count} audio chunks of {chunk_ms} ms)",
        output.display()
    );
    Ok(())
}

fn cmd_preload(input: &Path, indices: &[u32]) -> Result<()> {
    let handle = StreamingHandle::create(input)
        .with_context(|| format!("failed to open {}", input.display()))?;

    let indices: Vec<u32> = if indices.is_empty() {
        (0..handle.chunk_count()).collect()
    } else {
        indices.to_vec()
    };

    let pb = ProgressBar::new(indices.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40}] {pos}/{len}")?
            .progress_chars("#>-"),
    );
    for &index in &indices {
        handle.load_chunk(index)?;
        pb.inc(1);
    }
    pb.finish_and_clear();

    let stats = handle.cache_stats();
    println!(
        "loaded {} chunks: {} bytes cached, {} hits, {} misses",
        stats.loaded_count, stats.size_bytes, stats.hits, stats.misses
    );
    Ok(())
}
