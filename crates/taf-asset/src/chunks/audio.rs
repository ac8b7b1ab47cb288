//! Audio node-graph chunk payloads.
//!
//! An audio payload carries a complete synthesis graph: typed DSP nodes,
//! connections between node ports, a flat parameter array addressed by
//! per-node windows, and optional embedded wavetable or streaming-audio
//! data tails. Section order after the header is fixed: nodes,
//! connections, parameters, wavetable descriptors + sample bytes,
//! streaming descriptors + audio bytes. All descriptor offsets are
//! relative to the start of the audio payload.

use taf_common::{BinaryReader, BinaryWriter};

use crate::{Error, Result};

/// Serialized size of [`AudioHeader`] in bytes.
pub const AUDIO_HEADER_SIZE: usize = 64;

/// Serialized size of one [`AudioNode`] in bytes.
pub const AUDIO_NODE_SIZE: usize = 40;

/// Serialized size of one [`AudioConnection`] in bytes.
pub const AUDIO_CONNECTION_SIZE: usize = 20;

/// Serialized size of one [`AudioParameter`] in bytes.
pub const AUDIO_PARAMETER_SIZE: usize = 28;

/// Serialized size of one [`WaveTable`] descriptor in bytes.
pub const WAVETABLE_SIZE: usize = 48;

/// Serialized size of one [`StreamingAudio`] descriptor in bytes.
pub const STREAMING_AUDIO_SIZE: usize = 56;

/// DSP node kind. The numeric tags are part of the file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    // Generators
    Oscillator,
    WaveTablePlayer,
    NoiseGenerator,
    Sampler,
    StreamingSampler,
    // Processors
    Filter,
    Amplifier,
    Envelope,
    Lfo,
    Delay,
    Reverb,
    Distortion,
    Compressor,
    // Utility
    Mixer,
    Splitter,
    Math,
    // Game-aware
    GameState,
    Proximity,
    CombatIntensity,
    // Control
    PatternPlayer,
    Parameter,
    Random,
    // Custom
    VmNode,
}

impl NodeType {
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Oscillator => 0,
            Self::WaveTablePlayer => 1,
            Self::NoiseGenerator => 2,
            Self::Sampler => 3,
            Self::StreamingSampler => 4,
            Self::Filter => 10,
            Self::Amplifier => 11,
            Self::Envelope => 12,
            Self::Lfo => 13,
            Self::Delay => 14,
            Self::Reverb => 15,
            Self::Distortion => 16,
            Self::Compressor => 17,
            Self::Mixer => 20,
            Self::Splitter => 21,
            Self::Math => 22,
            Self::GameState => 30,
            Self::Proximity => 31,
            Self::CombatIntensity => 32,
            Self::PatternPlayer => 40,
            Self::Parameter => 41,
            Self::Random => 42,
            Self::VmNode => 100,
        }
    }

    pub fn from_u32(value: u32) -> Result<Self> {
        Ok(match value {
            0 => Self::Oscillator,
            1 => Self::WaveTablePlayer,
            2 => Self::NoiseGenerator,
            3 => Self::Sampler,
            4 => Self::StreamingSampler,
            10 => Self::Filter,
            11 => Self::Amplifier,
            12 => Self::Envelope,
            13 => Self::Lfo,
            14 => Self::Delay,
            15 => Self::Reverb,
            16 => Self::Distortion,
            17 => Self::Compressor,
            20 => Self::Mixer,
            21 => Self::Splitter,
            22 => Self::Math,
            30 => Self::GameState,
            31 => Self::Proximity,
            32 => Self::CombatIntensity,
            40 => Self::PatternPlayer,
            41 => Self::Parameter,
            42 => Self::Random,
            100 => Self::VmNode,
            other => return Err(Error::Validation(format!("unknown audio node type {other}"))),
        })
    }
}

/// Audio payload header: section counts plus timing configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioHeader {
    pub node_count: u32,
    pub connection_count: u32,
    pub pattern_count: u32,
    pub sample_count: u32,
    pub parameter_count: u32,
    pub sample_rate: u32,
    pub tick_rate: u32,
    pub streaming_count: u32,
}

impl AudioHeader {
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(AUDIO_HEADER_SIZE);
        self.write(&mut writer);
        writer.into_bytes()
    }

    pub fn write(&self, writer: &mut BinaryWriter) {
        writer.put_u32(self.node_count);
        writer.put_u32(self.connection_count);
        writer.put_u32(self.pattern_count);
        writer.put_u32(self.sample_count);
        writer.put_u32(self.parameter_count);
        writer.put_u32(self.sample_rate);
        writer.put_u32(self.tick_rate);
        writer.put_u32(self.streaming_count);
        writer.put_zeros(8 * 4); // reserved
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);
        let header = Self {
            node_count: reader.read_u32()?,
            connection_count: reader.read_u32()?,
            pattern_count: reader.read_u32()?,
            sample_count: reader.read_u32()?,
            parameter_count: reader.read_u32()?,
            sample_rate: reader.read_u32()?,
            tick_rate: reader.read_u32()?,
            streaming_count: reader.read_u32()?,
        };
        reader.advance(8 * 4);
        Ok(header)
    }
}

/// One node in the graph.
#[derive(Debug, Clone, Copy)]
pub struct AudioNode {
    pub id: u32,
    pub node_type: NodeType,
    pub name_hash: u64,
    /// Editor canvas position; carried for tooling, ignored at runtime.
    pub position: [f32; 2],
    pub input_count: u32,
    pub output_count: u32,
    /// Start of this node's window into the flat parameter array.
    pub param_offset: u32,
    pub param_count: u32,
}

impl AudioNode {
    pub fn write(&self, writer: &mut BinaryWriter) {
        writer.put_u32(self.id);
        writer.put_u32(self.node_type.as_u32());
        writer.put_u64(self.name_hash);
        writer.put_f32(self.position[0]);
        writer.put_f32(self.position[1]);
        writer.put_u32(self.input_count);
        writer.put_u32(self.output_count);
        writer.put_u32(self.param_offset);
        writer.put_u32(self.param_count);
    }

    pub fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            id: reader.read_u32()?,
            node_type: NodeType::from_u32(reader.read_u32()?)?,
            name_hash: reader.read_u64()?,
            position: [
                reader.read_f32()?,
                reader.read_f32()?,
            ],
            input_count: reader.read_u32()?,
            output_count: reader.read_u32()?,
            param_offset: reader.read_u32()?,
            param_count: reader.read_u32()?,
        })
    }
}

/// A directed edge between two node ports.
///
/// `strength` in [0, 1] scales the edge; 0.0 marks an edge that is
/// topologically present but gated off.
#[derive(Debug, Clone, Copy)]
pub struct AudioConnection {
    pub source_node: u32,
    pub source_output: u32,
    pub dest_node: u32,
    pub dest_input: u32,
    pub strength: f32,
}

impl AudioConnection {
    pub fn write(&self, writer: &mut BinaryWriter) {
        writer.put_u32(self.source_node);
        writer.put_u32(self.source_output);
        writer.put_u32(self.dest_node);
        writer.put_u32(self.dest_input);
        writer.put_f32(self.strength);
    }

    pub fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            source_node: reader.read_u32()?,
            source_output: reader.read_u32()?,
            dest_node: reader.read_u32()?,
            dest_input: reader.read_u32()?,
            strength: reader.read_f32()?,
        })
    }
}

/// A named scalar parameter with range and response curve.
///
/// Consumers map a normalized input `x` in [0,1] to
/// `min + (max - min) * x.powf(curve)`; curve 1.0 is linear, 2.0 is the
/// conventional exponential used for frequency.
#[derive(Debug, Clone, Copy)]
pub struct AudioParameter {
    pub name_hash: u64,
    pub default_value: f32,
    pub min_value: f32,
    pub max_value: f32,
    pub curve: f32,
    pub flags: u32,
}

impl AudioParameter {
    pub fn write(&self, writer: &mut BinaryWriter) {
        writer.put_u64(self.name_hash);
        writer.put_f32(self.default_value);
        writer.put_f32(self.min_value);
        writer.put_f32(self.max_value);
        writer.put_f32(self.curve);
        writer.put_u32(self.flags);
    }

    pub fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            name_hash: reader.read_u64()?,
            default_value: reader.read_f32()?,
            min_value: reader.read_f32()?,
            max_value: reader.read_f32()?,
            curve: reader.read_f32()?,
            flags: reader.read_u32()?,
        })
    }
}

/// Descriptor for an embedded wavetable; sample bytes follow the
/// descriptor array at `data_offset` from the start of the payload.
#[derive(Debug, Clone, Copy)]
pub struct WaveTable {
    pub name_hash: u64,
    /// Frames per channel.
    pub sample_count: u32,
    pub channel_count: u32,
    /// Bits per sample: 8, 16, 24 or 32.
    pub bit_depth: u32,
    pub data_offset: u64,
    pub data_size: u64,
    pub base_frequency: f32,
    pub loop_start: u32,
    pub loop_end: u32,
}

impl WaveTable {
    pub fn write(&self, writer: &mut BinaryWriter) {
        writer.put_u64(self.name_hash);
        writer.put_u32(self.sample_count);
        writer.put_u32(self.channel_count);
        writer.put_u32(self.bit_depth);
        writer.put_u64(self.data_offset);
        writer.put_u64(self.data_size);
        writer.put_f32(self.base_frequency);
        writer.put_u32(self.loop_start);
        writer.put_u32(self.loop_end);
    }

    pub fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        Ok(Self {
            name_hash: reader.read_u64()?,
            sample_count: reader.read_u32()?,
            channel_count: reader.read_u32()?,
            bit_depth: reader.read_u32()?,
            data_offset: reader.read_u64()?,
            data_size: reader.read_u64()?,
            base_frequency: reader.read_f32()?,
            loop_start: reader.read_u32()?,
            loop_end: reader.read_u32()?,
        })
    }
}

/// Sample encoding for streaming audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamFormat {
    #[default]
    Pcm = 0,
    Float = 1,
}

impl StreamFormat {
    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Pcm),
            1 => Ok(Self::Float),
            other => Err(Error::Validation(format!("unknown stream format {other}"))),
        }
    }
}

/// Descriptor for chunked streaming audio embedded in the payload.
///
/// Consumers read fixed windows of `chunk_size` samples sequentially from
/// `data_offset`, or seek by `chunk_size * bytes_per_sample * channels`.
#[derive(Debug, Clone, Copy)]
pub struct StreamingAudio {
    pub name_hash: u64,
    pub sample_rate: u32,
    pub channel_count: u32,
    pub bit_depth: u32,
    pub total_samples: u32,
    /// Samples per streaming chunk.
    pub chunk_size: u32,
    pub chunk_count: u32,
    pub data_offset: u64,
    pub format: StreamFormat,
}

impl StreamingAudio {
    pub fn write(&self, writer: &mut BinaryWriter) {
        writer.put_u64(self.name_hash);
        writer.put_u32(self.sample_rate);
        writer.put_u32(self.channel_count);
        writer.put_u32(self.bit_depth);
        writer.put_u32(self.total_samples);
        writer.put_u32(self.chunk_size);
        writer.put_u32(self.chunk_count);
        writer.put_u64(self.data_offset);
        writer.put_u32(self.format as u32);
        writer.put_zeros(3 * 4); // reserved
    }

    pub fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let stream = Self {
            name_hash: reader.read_u64()?,
            sample_rate: reader.read_u32()?,
            channel_count: reader.read_u32()?,
            bit_depth: reader.read_u32()?,
            total_samples: reader.read_u32()?,
            chunk_size: reader.read_u32()?,
            chunk_count: reader.read_u32()?,
            data_offset: reader.read_u64()?,
            format: StreamFormat::from_u32(reader.read_u32()?)?,
        };
        reader.advance(3 * 4);
        Ok(stream)
    }
}

/// A decoded view of an audio payload.
#[derive(Debug)]
pub struct AudioChunk<'a> {
    pub header: AudioHeader,
    pub nodes: Vec<AudioNode>,
    pub connections: Vec<AudioConnection>,
    pub parameters: Vec<AudioParameter>,
    pub wavetables: Vec<WaveTable>,
    pub streams: Vec<StreamingAudio>,
    payload: &'a [u8],
}

impl<'a> AudioChunk<'a> {
    /// Parse all sections of an audio payload.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        if payload.len() < AUDIO_HEADER_SIZE {
            return Err(Error::Validation(format!(
                "audio payload too small: {} bytes",
                payload.len()
            )));
        }
        let header = AudioHeader::decode(payload)?;
        let mut reader = BinaryReader::new_at(payload, AUDIO_HEADER_SIZE);

        let nodes: Vec<AudioNode> = (0..header.node_count)
            .map(|_| AudioNode::read(&mut reader))
            .collect::<Result<_>>()?;
        let connections: Vec<AudioConnection> = (0..header.connection_count)
            .map(|_| AudioConnection::read(&mut reader))
            .collect::<Result<_>>()?;
        let parameters: Vec<AudioParameter> = (0..header.parameter_count)
            .map(|_| AudioParameter::read(&mut reader))
            .collect::<Result<_>>()?;
        let wavetables: Vec<WaveTable> = (0..header.sample_count)
            .map(|_| WaveTable::read(&mut reader))
            .collect::<Result<_>>()?;

        // Wavetable sample bytes sit between the wavetable descriptors and
        // any streaming descriptors; skip to the streaming section.
        let mut streams = Vec::with_capacity(header.streaming_count as usize);
        if header.streaming_count > 0 {
            let wavetable_tail: u64 = wavetables.iter().map(|w| w.data_size).sum();
            reader.advance(wavetable_tail as usize);
            for _ in 0..header.streaming_count {
                streams.push(StreamingAudio::read(&mut reader)?);
            }
        }

        // Validate parameter windows against the flat array.
        for node in &nodes {
            let end = node.param_offset as u64 + node.param_count as u64;
            if end > header.parameter_count as u64 {
                return Err(Error::Validation(format!(
                    "node {} parameter window [{}, {end}) exceeds parameter count {}",
                    node.id, node.param_offset, header.parameter_count
                )));
            }
        }

        // Validate descriptor data windows against the payload.
        for wavetable in &wavetables {
            let end = wavetable.data_offset + wavetable.data_size;
            if end > payload.len() as u64 {
                return Err(Error::Validation(format!(
                    "wavetable data window [{}, {end}) exceeds payload size {}",
                    wavetable.data_offset,
                    payload.len()
                )));
            }
        }
        for stream in &streams {
            if stream.data_offset > payload.len() as u64 {
                return Err(Error::Validation(format!(
                    "streaming data offset {} exceeds payload size {}",
                    stream.data_offset,
                    payload.len()
                )));
            }
        }

        Ok(Self {
            header,
            nodes,
            connections,
            parameters,
            wavetables,
            streams,
            payload,
        })
    }

    /// The parameters addressed by a node's window.
    pub fn node_parameters(&self, node: &AudioNode) -> &[AudioParameter] {
        let start = node.param_offset as usize;
        &self.parameters[start..start + node.param_count as usize]
    }

    /// Find a parameter by name hash.
    pub fn find_parameter(&self, name_hash: u64) -> Option<&AudioParameter> {
        self.parameters.iter().find(|p| p.name_hash == name_hash)
    }

    /// Raw sample bytes for a wavetable descriptor.
    pub fn wavetable_data(&self, wavetable: &WaveTable) -> &'a [u8] {
        let start = wavetable.data_offset as usize;
        &self.payload[start..start + wavetable.data_size as usize]
    }

    /// Raw bytes for one streaming chunk window.
    pub fn stream_chunk_data(&self, stream: &StreamingAudio, chunk_index: u32) -> Result<&'a [u8]> {
        if chunk_index >= stream.chunk_count {
            return Err(Error::Validation(format!(
                "stream chunk index {chunk_index} out of range (count {})",
                stream.chunk_count
            )));
        }
        let bytes_per_sample = (stream.bit_depth / 8) as u64 * stream.channel_count as u64;
        let chunk_bytes = stream.chunk_size as u64 * bytes_per_sample;
        let start = stream.data_offset + chunk_index as u64 * chunk_bytes;
        let end = (start + chunk_bytes).min(self.payload.len() as u64);
        if start > end {
            return Err(Error::Validation(format!(
                "stream chunk {chunk_index} starts beyond payload"
            )));
        }
        Ok(&self.payload[start as usize..end as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_type_tags_are_stable() {
        assert_eq!(NodeType::Oscillator.as_u32(), 0);
        assert_eq!(NodeType::StreamingSampler.as_u32(), 4);
        assert_eq!(NodeType::Filter.as_u32(), 10);
        assert_eq!(NodeType::Compressor.as_u32(), 17);
        assert_eq!(NodeType::Mixer.as_u32(), 20);
        assert_eq!(NodeType::CombatIntensity.as_u32(), 32);
        assert_eq!(NodeType::Random.as_u32(), 42);
        assert_eq!(NodeType::VmNode.as_u32(), 100);
        assert_eq!(NodeType::from_u32(41).unwrap(), NodeType::Parameter);
        assert!(NodeType::from_u32(99).is_err());
    }

    #[test]
    fn record_sizes_are_fixed() {
        let mut writer = BinaryWriter::new();
        AudioNode {
            id: 0,
            node_type: NodeType::Oscillator,
            name_hash: 1,
            position: [0.0, 0.0],
            input_count: 1,
            output_count: 1,
            param_offset: 0,
            param_count: 2,
        }
        .write(&mut writer);
        assert_eq!(writer.len(), AUDIO_NODE_SIZE);

        let mut writer = BinaryWriter::new();
        AudioConnection {
            source_node: 0,
            source_output: 0,
            dest_node: 1,
            dest_input: 0,
            strength: 1.0,
        }
        .write(&mut writer);
        assert_eq!(writer.len(), AUDIO_CONNECTION_SIZE);

        let mut writer = BinaryWriter::new();
        AudioParameter {
            name_hash: 1,
            default_value: 0.0,
            min_value: 0.0,
            max_value: 1.0,
            curve: 1.0,
            flags: 0,
        }
        .write(&mut writer);
        assert_eq!(writer.len(), AUDIO_PARAMETER_SIZE);

        let mut writer = BinaryWriter::new();
        WaveTable {
            name_hash: 1,
            sample_count: 0,
            channel_count: 1,
            bit_depth: 16,
            data_offset: 0,
            data_size: 0,
            base_frequency: 440.0,
            loop_start: 0,
            loop_end: 0,
        }
        .write(&mut writer);
        assert_eq!(writer.len(), WAVETABLE_SIZE);

        let mut writer = BinaryWriter::new();
        StreamingAudio {
            name_hash: 1,
            sample_rate: 48000,
            channel_count: 1,
            bit_depth: 32,
            total_samples: 0,
            chunk_size: 24000,
            chunk_count: 0,
            data_offset: 0,
            format: StreamFormat::Float,
        }
        .write(&mut writer);
        assert_eq!(writer.len(), STREAMING_AUDIO_SIZE);

        assert_eq!(AudioHeader::default().encode().len(), AUDIO_HEADER_SIZE);
    }

    #[test]
    fn header_roundtrip() {
        let header = AudioHeader {
            node_count: 3,
            connection_count: 2,
            parameter_count: 4,
            sample_rate: 48000,
            streaming_count: 1,
            ..Default::default()
        };
        let decoded = AudioHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded.node_count, 3);
        assert_eq!(decoded.sample_rate, 48000);
        assert_eq!(decoded.streaming_count, 1);
    }
}
