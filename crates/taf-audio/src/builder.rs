//! Audio graph builder.
//!
//! [`AudioGraphBuilder`] assembles nodes, connections and parameters into
//! an AUDI chunk payload. Parameters attach to nodes and are flattened
//! into the on-disk array at build time, so node parameter windows are
//! always contiguous, disjoint and in node order. Wavetable and streaming
//! tails are appended after the descriptor arrays with offsets computed
//! from the preceding section sizes.

use taf_asset::chunks::audio::{
    AudioConnection, AudioHeader, AudioNode, AudioParameter, NodeType, StreamFormat,
    StreamingAudio, WaveTable, AUDIO_CONNECTION_SIZE, AUDIO_HEADER_SIZE, AUDIO_NODE_SIZE,
    AUDIO_PARAMETER_SIZE, STREAMING_AUDIO_SIZE, WAVETABLE_SIZE,
};
use taf_common::{registry, BinaryWriter};

use crate::{Error, Result};

/// Identifier of a node within a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone)]
struct NodeSpec {
    id: u32,
    node_type: NodeType,
    name_hash: u64,
    position: [f32; 2],
    input_count: u32,
    output_count: u32,
    parameters: Vec<AudioParameter>,
}

#[derive(Debug, Clone)]
struct WaveTableSpec {
    name_hash: u64,
    frame_count: u32,
    channel_count: u32,
    base_frequency: f32,
    loop_start: u32,
    loop_end: u32,
    /// 16-bit signed samples, interleaved.
    samples: Vec<i16>,
}

#[derive(Debug, Clone)]
struct StreamSpec {
    name_hash: u64,
    sample_rate: u32,
    channel_count: u32,
    bit_depth: u32,
    total_samples: u32,
    chunk_size: u32,
    format: StreamFormat,
    bytes: Vec<u8>,
}

/// Builder for AUDI chunk payloads.
#[derive(Debug, Clone)]
pub struct AudioGraphBuilder {
    sample_rate: u32,
    tick_rate: u32,
    nodes: Vec<NodeSpec>,
    connections: Vec<AudioConnection>,
    wavetables: Vec<WaveTableSpec>,
    streams: Vec<StreamSpec>,
}

impl AudioGraphBuilder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            tick_rate: 0,
            nodes: Vec::new(),
            connections: Vec::new(),
            wavetables: Vec::new(),
            streams: Vec::new(),
        }
    }

    /// Tracker tick rate; zero when tracker timing is unused.
    pub fn set_tick_rate(&mut self, tick_rate: u32) {
        self.tick_rate = tick_rate;
    }

    /// Add a node. Ids are assigned sequentially from zero.
    pub fn add_node(
        &mut self,
        node_type: NodeType,
        name: &str,
        position: [f32; 2],
        input_count: u32,
        output_count: u32,
    ) -> NodeId {
        let id = self.nodes.len() as u32;
        self.nodes.push(NodeSpec {
            id,
            node_type,
            name_hash: registry::register(name),
            position,
            input_count,
            output_count,
            parameters: Vec::new(),
        });
        NodeId(id)
    }

    /// Attach a parameter to a node's window.
    pub fn add_parameter(
        &mut self,
        node: NodeId,
        name: &str,
        default_value: f32,
        min_value: f32,
        max_value: f32,
        curve: f32,
    ) -> Result<()> {
        let spec = self
            .nodes
            .get_mut(node.0 as usize)
            .ok_or(Error::UnknownNode(node.0))?;
        spec.parameters.push(AudioParameter {
            name_hash: registry::register(name),
            default_value,
            min_value,
            max_value,
            curve,
            flags: 0,
        });
        Ok(())
    }

    /// Connect a source output port to a destination input port.
    ///
    /// `strength` is clamped to [0, 1]; zero keeps the edge present but
    /// gated off, the convention for connections latched at load.
    pub fn connect(
        &mut self,
        source: NodeId,
        source_output: u32,
        dest: NodeId,
        dest_input: u32,
        strength: f32,
    ) -> Result<()> {
        let source_spec = self
            .nodes
            .get(source.0 as usize)
            .ok_or(Error::UnknownNode(source.0))?;
        if source_output >= source_spec.output_count {
            return Err(Error::InvalidPort {
                node: source.0,
                kind: "output",
                port: source_output,
                count: source_spec.output_count,
            });
        }
        let dest_spec = self
            .nodes
            .get(dest.0 as usize)
            .ok_or(Error::UnknownNode(dest.0))?;
        if dest_input >= dest_spec.input_count {
            return Err(Error::InvalidPort {
                node: dest.0,
                kind: "input",
                port: dest_input,
                count: dest_spec.input_count,
            });
        }

        self.connections.push(AudioConnection {
            source_node: source.0,
            source_output,
            dest_node: dest.0,
            dest_input,
            strength: strength.clamp(0.0, 1.0),
        });
        Ok(())
    }

    /// Embed a wavetable. Float samples are stored as 16-bit signed
    /// integers: clamped to [-1, 1], scaled by 32767 and truncated.
    pub fn add_wavetable(
        &mut self,
        name: &str,
        samples: &[f32],
        channel_count: u32,
        base_frequency: f32,
        loop_start: u32,
        loop_end: u32,
    ) -> Result<()> {
        if channel_count == 0 {
            return Err(Error::InvalidData("wavetable channel count is zero".into()));
        }
        if samples.len() % channel_count as usize != 0 {
            return Err(Error::InvalidData(format!(
                "{} samples do not divide into {channel_count} channels",
                samples.len()
            )));
        }
        let converted: Vec<i16> = samples
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
            .collect();

        self.wavetables.push(WaveTableSpec {
            name_hash: registry::register(name),
            frame_count: (samples.len() / channel_count as usize) as u32,
            channel_count,
            base_frequency,
            loop_start,
            loop_end,
            samples: converted,
        });
        Ok(())
    }

    /// Embed a streaming audio tail of pre-encoded bytes.
    pub fn add_stream(
        &mut self,
        name: &str,
        sample_rate: u32,
        channel_count: u32,
        bit_depth: u32,
        total_samples: u32,
        samples_per_chunk: u32,
        format: StreamFormat,
        bytes: Vec<u8>,
    ) -> Result<()> {
        if samples_per_chunk == 0 {
            return Err(Error::InvalidData("streaming chunk size is zero".into()));
        }
        let expected = total_samples as u64 * (bit_depth as u64 / 8) * channel_count as u64;
        if bytes.len() as u64 != expected {
            return Err(Error::InvalidData(format!(
                "streaming data is {} bytes, declaration implies {expected}",
                bytes.len()
            )));
        }
        self.streams.push(StreamSpec {
            name_hash: registry::register(name),
            sample_rate,
            channel_count,
            bit_depth,
            total_samples,
            chunk_size: samples_per_chunk,
            format,
            bytes,
        });
        Ok(())
    }

    /// Emit the payload: header, nodes, connections, parameters,
    /// wavetable descriptors + bytes, streaming descriptors + bytes.
    pub fn build(&self) -> Vec<u8> {
        let parameter_count: usize = self.nodes.iter().map(|n| n.parameters.len()).sum();

        let header = AudioHeader {
            node_count: self.nodes.len() as u32,
            connection_count: self.connections.len() as u32,
            pattern_count: 0,
            sample_count: self.wavetables.len() as u32,
            parameter_count: parameter_count as u32,
            sample_rate: self.sample_rate,
            tick_rate: self.tick_rate,
            streaming_count: self.streams.len() as u32,
        };

        let nodes_size = self.nodes.len() * AUDIO_NODE_SIZE;
        let connections_size = self.connections.len() * AUDIO_CONNECTION_SIZE;
        let params_size = parameter_count * AUDIO_PARAMETER_SIZE;
        let wavetable_descs_size = self.wavetables.len() * WAVETABLE_SIZE;
        let wavetable_data_size: usize = self.wavetables.iter().map(|w| w.samples.len() * 2).sum();
        let stream_descs_size = self.streams.len() * STREAMING_AUDIO_SIZE;
        let stream_data_size: usize = self.streams.iter().map(|s| s.bytes.len()).sum();

        let total = AUDIO_HEADER_SIZE
            + nodes_size
            + connections_size
            + params_size
            + wavetable_descs_size
            + wavetable_data_size
            + stream_descs_size
            + stream_data_size;

        let mut writer = BinaryWriter::with_capacity(total);
        header.write(&mut writer);

        // Nodes, with parameter windows flattened in node order.
        let mut param_offset = 0u32;
        for spec in &self.nodes {
            AudioNode {
                id: spec.id,
                node_type: spec.node_type,
                name_hash: spec.name_hash,
                position: spec.position,
                input_count: spec.input_count,
                output_count: spec.output_count,
                param_offset,
                param_count: spec.parameters.len() as u32,
            }
            .write(&mut writer);
            param_offset += spec.parameters.len() as u32;
        }

        for connection in &self.connections {
            connection.write(&mut writer);
        }
        for spec in &self.nodes {
            for parameter in &spec.parameters {
                parameter.write(&mut writer);
            }
        }

        // Wavetable descriptors, then their sample bytes.
        let mut data_offset = (AUDIO_HEADER_SIZE
            + nodes_size
            + connections_size
            + params_size
            + wavetable_descs_size) as u64;
        for spec in &self.wavetables {
            let data_size = (spec.samples.len() * 2) as u64;
            WaveTable {
                name_hash: spec.name_hash,
                sample_count: spec.frame_count,
                channel_count: spec.channel_count,
                bit_depth: 16,
                data_offset,
                data_size,
                base_frequency: spec.base_frequency,
                loop_start: spec.loop_start,
                loop_end: spec.loop_end,
            }
            .write(&mut writer);
            data_offset += data_size;
        }
        for spec in &self.wavetables {
            for &sample in &spec.samples {
                writer.put_bytes(&sample.to_le_bytes());
            }
        }

        // Streaming descriptors, then their audio bytes.
        let mut data_offset = data_offset + stream_descs_size as u64;
        for spec in &self.streams {
            let chunk_count = spec.total_samples.div_ceil(spec.chunk_size);
            StreamingAudio {
                name_hash: spec.name_hash,
                sample_rate: spec.sample_rate,
                channel_count: spec.channel_count,
                bit_depth: spec.bit_depth,
                total_samples: spec.total_samples,
                chunk_size: spec.chunk_size,
                chunk_count,
                data_offset,
                format: spec.format,
            }
            .write(&mut writer);
            data_offset += spec.bytes.len() as u64;
        }
        for spec in &self.streams {
            writer.put_bytes(&spec.bytes);
        }

        debug_assert_eq!(writer.len(), total);
        log::debug!(
            "built audio payload: {} nodes, {} connections, {parameter_count} parameters, {total} bytes",
            self.nodes.len(),
            self.connections.len()
        );
        writer.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taf_asset::chunks::audio::AudioChunk;
    use taf_common::hash::param_hashes;

    #[test]
    fn parameter_windows_are_contiguous_and_disjoint() {
        let mut builder = AudioGraphBuilder::new(48000);
        let osc = builder.add_node(NodeType::Oscillator, "osc", [100.0, 100.0], 1, 1);
        let amp = builder.add_node(NodeType::Amplifier, "amp", [300.0, 100.0], 2, 1);
        builder.add_parameter(osc, "frequency", 440.0, 20.0, 20000.0, 2.0).unwrap();
        builder.add_parameter(osc, "waveform", 0.0, 0.0, 4.0, 1.0).unwrap();
        builder.add_parameter(amp, "amplitude", 0.7, 0.0, 1.0, 1.0).unwrap();
        builder.connect(osc, 0, amp, 0, 1.0).unwrap();

        let payload = builder.build();
        let chunk = AudioChunk::parse(&payload).unwrap();

        assert_eq!(chunk.nodes[0].param_offset, 0);
        assert_eq!(chunk.nodes[0].param_count, 2);
        assert_eq!(chunk.nodes[1].param_offset, 2);
        assert_eq!(chunk.nodes[1].param_count, 1);
        assert_eq!(chunk.parameters.len(), 3);
        assert_eq!(
            chunk.node_parameters(&chunk.nodes[1])[0].name_hash,
            param_hashes::AMPLITUDE
        );
    }

    #[test]
    fn connect_validates_ports() {
        let mut builder = AudioGraphBuilder::new(48000);
        let osc = builder.add_node(NodeType::Oscillator, "osc", [0.0, 0.0], 1, 1);
        let amp = builder.add_node(NodeType::Amplifier, "amp", [0.0, 0.0], 2, 1);

        assert!(builder.connect(osc, 0, amp, 1, 1.0).is_ok());
        assert!(matches!(
            builder.connect(osc, 1, amp, 0, 1.0),
            Err(Error::InvalidPort { kind: "output", .. })
        ));
        assert!(matches!(
            builder.connect(osc, 0, amp, 2, 1.0),
            Err(Error::InvalidPort { kind: "input", .. })
        ));
        assert!(matches!(
            builder.connect(NodeId(9), 0, amp, 0, 1.0),
            Err(Error::UnknownNode(9))
        ));
    }

    #[test]
    fn strength_is_clamped() {
        let mut builder = AudioGraphBuilder::new(48000);
        let a = builder.add_node(NodeType::Oscillator, "a", [0.0, 0.0], 0, 1);
        let b = builder.add_node(NodeType::Amplifier, "b", [0.0, 0.0], 1, 1);
        builder.connect(a, 0, b, 0, 2.5).unwrap();

        let payload = builder.build();
        let chunk = AudioChunk::parse(&payload).unwrap();
        assert_eq!(chunk.connections[0].strength, 1.0);
    }

    #[test]
    fn wavetable_samples_convert_to_i16() {
        let mut builder = AudioGraphBuilder::new(44100);
        builder
            .add_wavetable("tone", &[0.0, 1.0, -1.0, 2.0, 0.5], 1, 440.0, 0, 0)
            .unwrap();

        let payload = builder.build();
        let chunk = AudioChunk::parse(&payload).unwrap();
        assert_eq!(chunk.wavetables.len(), 1);

        let table = &chunk.wavetables[0];
        assert_eq!(table.bit_depth, 16);
        assert_eq!(table.sample_count, 5);
        assert_eq!(table.data_size, 10);
        assert_eq!(
            table.data_offset as usize,
            AUDIO_HEADER_SIZE + WAVETABLE_SIZE
        );

        let data = chunk.wavetable_data(table);
        let decoded: Vec<i16> = data
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(decoded, vec![0, 32767, -32767, 32767, 16383]);
    }

    #[test]
    fn stream_descriptor_offsets_account_for_wavetables() {
        let mut builder = AudioGraphBuilder::new(48000);
        builder
            .add_wavetable("table", &[0.0; 8], 1, 440.0, 0, 0)
            .unwrap();
        builder
            .add_stream(
                "stream",
                48000,
                1,
                32,
                6,
                4,
                StreamFormat::Float,
                vec![0u8; 24],
            )
            .unwrap();

        let payload = builder.build();
        let chunk = AudioChunk::parse(&payload).unwrap();

        let stream = &chunk.streams[0];
        assert_eq!(stream.chunk_count, 2);
        let expected = AUDIO_HEADER_SIZE + WAVETABLE_SIZE + 16 + STREAMING_AUDIO_SIZE;
        assert_eq!(stream.data_offset as usize, expected);
        assert_eq!(payload.len(), expected + 24);

        // Last chunk is short: 2 of 4 samples.
        assert_eq!(chunk.stream_chunk_data(stream, 0).unwrap().len(), 16);
        assert_eq!(chunk.stream_chunk_data(stream, 1).unwrap().len(), 8);
        assert!(chunk.stream_chunk_data(stream, 2).is_err());
    }

    #[test]
    fn mismatched_stream_bytes_are_rejected() {
        let mut builder = AudioGraphBuilder::new(48000);
        let err = builder.add_stream(
            "bad",
            48000,
            1,
            32,
            100,
            10,
            StreamFormat::Float,
            vec![0u8; 8],
        );
        assert!(matches!(err, Err(Error::InvalidData(_))));
    }
}
