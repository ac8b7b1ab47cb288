//! Canned audio graphs for common asset shapes.
//!
//! These mirror the graphs the asset tooling emits: pure-synthesis
//! oscillator chains, the mixer / ADSR / filter-sweep / distortion
//! processing demos, a sample player over an embedded wavetable, and a
//! streaming player whose audio lives in a chunked tail.

use taf_asset::chunks::audio::{NodeType, StreamFormat};

use crate::builder::AudioGraphBuilder;
use crate::Result;

/// Basic oscillator waveform selector values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    #[default]
    Sine = 0,
    Square = 1,
    Saw = 2,
    Triangle = 3,
    Noise = 4,
}

/// Filter response selector values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterKind {
    #[default]
    Lowpass = 0,
    Highpass = 1,
    Bandpass = 2,
}

impl FilterKind {
    /// Short name used in chunk names and descriptions.
    pub fn name(self) -> &'static str {
        match self {
            Self::Lowpass => "lowpass",
            Self::Highpass => "highpass",
            Self::Bandpass => "bandpass",
        }
    }
}

/// Distortion algorithm selector values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistortionKind {
    #[default]
    HardClip = 0,
    SoftClip = 1,
    Foldback = 2,
    BitCrush = 3,
    Overdrive = 4,
    Beeper = 5,
}

impl DistortionKind {
    /// Short name used in chunk names and descriptions.
    pub fn name(self) -> &'static str {
        match self {
            Self::HardClip => "hardclip",
            Self::SoftClip => "softclip",
            Self::Foldback => "foldback",
            Self::BitCrush => "bitcrush",
            Self::Overdrive => "overdrive",
            Self::Beeper => "beeper",
        }
    }

    /// Drive amount that makes each algorithm audible.
    pub fn drive(self) -> f32 {
        match self {
            Self::HardClip => 10.0,
            Self::SoftClip => 5.0,
            Self::Foldback => 8.0,
            Self::BitCrush => 6.0,
            Self::Overdrive => 12.0,
            Self::Beeper => 2.0,
        }
    }
}

/// Oscillator -> Amplifier with a latched time parameter.
///
/// Three nodes, two connections (the time edge is gated off), four
/// parameters: frequency (exponential curve), waveform, amplitude, time.
pub fn sine_wave_graph(frequency: f32, duration: f32, waveform: Waveform) -> Result<Vec<u8>> {
    let mut builder = AudioGraphBuilder::new(48000);

    let osc = builder.add_node(NodeType::Oscillator, "sine_oscillator", [100.0, 100.0], 1, 1);
    let amp = builder.add_node(NodeType::Amplifier, "main_amplifier", [300.0, 100.0], 2, 1);
    let time = builder.add_node(NodeType::Parameter, "time_parameter", [100.0, 200.0], 0, 1);

    builder.add_parameter(osc, "frequency", frequency, 20.0, 20000.0, 2.0)?;
    builder.add_parameter(osc, "waveform", waveform as u32 as f32, 0.0, 4.0, 1.0)?;
    builder.add_parameter(amp, "amplitude", 0.7, 0.0, 1.0, 1.0)?;
    builder.add_parameter(time, "time", 0.0, 0.0, duration, 1.0)?;

    builder.connect(osc, 0, amp, 0, 1.0)?;
    // Reserved modulation path, latched off by default.
    builder.connect(time, 0, osc, 0, 0.0)?;

    Ok(builder.build())
}

/// Three detuned oscillators -> Mixer -> Amplifier.
///
/// A C major triad: sine, square and triangle oscillators feed a
/// three-input mixer with per-channel gains. Five nodes, four
/// connections, ten parameters.
pub fn mixer_demo_graph() -> Result<Vec<u8>> {
    let mut builder = AudioGraphBuilder::new(48000);

    let sine = builder.add_node(NodeType::Oscillator, "sine_osc", [100.0, 100.0], 1, 1);
    let square = builder.add_node(NodeType::Oscillator, "square_osc", [100.0, 200.0], 1, 1);
    let triangle = builder.add_node(NodeType::Oscillator, "triangle_osc", [100.0, 300.0], 1, 1);
    let mixer = builder.add_node(NodeType::Mixer, "main_mixer", [300.0, 200.0], 3, 1);
    let amp = builder.add_node(NodeType::Amplifier, "output_amp", [500.0, 200.0], 2, 1);

    // C4, E4 and G4.
    builder.add_parameter(sine, "frequency", 261.626, 20.0, 20000.0, 2.0)?;
    builder.add_parameter(sine, "waveform", Waveform::Sine as u32 as f32, 0.0, 4.0, 1.0)?;
    builder.add_parameter(square, "frequency", 329.628, 20.0, 20000.0, 2.0)?;
    builder.add_parameter(square, "waveform", Waveform::Square as u32 as f32, 0.0, 4.0, 1.0)?;
    builder.add_parameter(triangle, "frequency", 391.995, 20.0, 20000.0, 2.0)?;
    builder.add_parameter(
        triangle,
        "waveform",
        Waveform::Triangle as u32 as f32,
        0.0,
        4.0,
        1.0,
    )?;
    builder.add_parameter(mixer, "gain_0", 0.33, 0.0, 1.0, 1.0)?;
    builder.add_parameter(mixer, "gain_1", 0.33, 0.0, 1.0, 1.0)?;
    builder.add_parameter(mixer, "gain_2", 0.33, 0.0, 1.0, 1.0)?;
    builder.add_parameter(amp, "amplitude", 0.7, 0.0, 1.0, 1.0)?;

    builder.connect(sine, 0, mixer, 0, 1.0)?;
    builder.connect(square, 0, mixer, 1, 1.0)?;
    builder.connect(triangle, 0, mixer, 2, 1.0)?;
    builder.connect(mixer, 0, amp, 0, 1.0)?;

    Ok(builder.build())
}

/// Gate -> Envelope modulating an Oscillator -> Amplifier chain.
///
/// The gate drives an ADSR envelope whose output rides the amplifier's
/// modulation input. Four nodes, three connections, eight parameters.
pub fn adsr_envelope_graph() -> Result<Vec<u8>> {
    let mut builder = AudioGraphBuilder::new(48000);

    let gate = builder.add_node(NodeType::Parameter, "gate_generator", [100.0, 100.0], 0, 1);
    let envelope = builder.add_node(NodeType::Envelope, "adsr_envelope", [300.0, 100.0], 1, 1);
    let osc = builder.add_node(NodeType::Oscillator, "tone_oscillator", [300.0, 200.0], 1, 1);
    let amp = builder.add_node(NodeType::Amplifier, "envelope_amp", [500.0, 150.0], 2, 1);

    builder.add_parameter(gate, "gate", 1.0, 0.0, 1.0, 1.0)?;
    builder.add_parameter(envelope, "attack", 0.1, 0.001, 2.0, 2.0)?;
    builder.add_parameter(envelope, "decay", 0.2, 0.001, 2.0, 2.0)?;
    builder.add_parameter(envelope, "sustain", 0.6, 0.0, 1.0, 1.0)?;
    builder.add_parameter(envelope, "release", 0.5, 0.001, 3.0, 2.0)?;
    builder.add_parameter(osc, "frequency", 440.0, 20.0, 20000.0, 2.0)?;
    builder.add_parameter(osc, "waveform", Waveform::Sine as u32 as f32, 0.0, 4.0, 1.0)?;
    builder.add_parameter(amp, "amplitude", 0.8, 0.0, 1.0, 1.0)?;

    builder.connect(gate, 0, envelope, 0, 1.0)?;
    builder.connect(osc, 0, amp, 0, 1.0)?;
    // Envelope rides the amplifier's modulation input.
    builder.connect(envelope, 0, amp, 1, 1.0)?;

    Ok(builder.build())
}

/// Saw oscillator -> Filter swept by an envelope -> Amplifier.
///
/// A low sawtooth for rich harmonics, a resonant filter whose cutoff is
/// modulated by a gate-driven envelope. Five nodes, four connections,
/// eleven parameters.
pub fn filter_sweep_graph(filter_kind: FilterKind) -> Result<Vec<u8>> {
    let mut builder = AudioGraphBuilder::new(48000);

    let osc = builder.add_node(NodeType::Oscillator, "saw_oscillator", [100.0, 100.0], 0, 1);
    let envelope = builder.add_node(NodeType::Envelope, "filter_envelope", [100.0, 250.0], 1, 1);
    let filter = builder.add_node(NodeType::Filter, "demo_filter", [300.0, 150.0], 2, 1);
    let amp = builder.add_node(NodeType::Amplifier, "output_amp", [500.0, 150.0], 1, 1);
    let gate = builder.add_node(NodeType::Parameter, "gate_param", [100.0, 350.0], 0, 1);

    // A2, low enough to hear the sweep.
    builder.add_parameter(osc, "frequency", 110.0, 20.0, 20000.0, 2.0)?;
    builder.add_parameter(osc, "waveform", Waveform::Saw as u32 as f32, 0.0, 4.0, 1.0)?;
    // No sustain: the cutoff sweeps back down to its base.
    builder.add_parameter(envelope, "attack", 0.5, 0.001, 10.0, 2.0)?;
    builder.add_parameter(envelope, "decay", 0.7, 0.001, 10.0, 2.0)?;
    builder.add_parameter(envelope, "sustain", 0.0, 0.0, 1.0, 1.0)?;
    builder.add_parameter(envelope, "release", 0.3, 0.001, 10.0, 2.0)?;
    builder.add_parameter(filter, "cutoff", 200.0, 20.0, 20000.0, 2.0)?;
    builder.add_parameter(filter, "resonance", 5.0, 0.1, 20.0, 1.0)?;
    builder.add_parameter(filter, "type", filter_kind as u32 as f32, 0.0, 2.0, 1.0)?;
    builder.add_parameter(amp, "amplitude", 0.7, 0.0, 1.0, 1.0)?;
    builder.add_parameter(gate, "gate", 1.0, 0.0, 1.0, 1.0)?;

    builder.connect(osc, 0, filter, 0, 1.0)?;
    // Cutoff modulation; depth scales with the cutoff parameter range.
    builder.connect(envelope, 0, filter, 1, 1.0)?;
    builder.connect(filter, 0, amp, 0, 1.0)?;
    builder.connect(gate, 0, envelope, 0, 1.0)?;

    Ok(builder.build())
}

/// Oscillator -> Distortion -> Amplifier.
///
/// A clean input tone into one of the distortion algorithms at full wet
/// mix. Three nodes, two connections, six parameters.
pub fn distortion_graph(kind: DistortionKind) -> Result<Vec<u8>> {
    let mut builder = AudioGraphBuilder::new(48000);

    let osc = builder.add_node(NodeType::Oscillator, "input_oscillator", [100.0, 100.0], 0, 1);
    let distortion = builder.add_node(NodeType::Distortion, "demo_distortion", [300.0, 100.0], 1, 1);
    let amp = builder.add_node(NodeType::Amplifier, "output_amp", [500.0, 100.0], 1, 1);

    // The beeper wants a saw at A5 for extra harmonics; the rest take a
    // clean A4 sine.
    let (frequency, waveform) = match kind {
        DistortionKind::Beeper => (880.0, Waveform::Saw),
        _ => (440.0, Waveform::Sine),
    };
    builder.add_parameter(osc, "frequency", frequency, 20.0, 20000.0, 2.0)?;
    builder.add_parameter(osc, "waveform", waveform as u32 as f32, 0.0, 4.0, 1.0)?;
    builder.add_parameter(distortion, "drive", kind.drive(), 0.1, 20.0, 1.0)?;
    builder.add_parameter(distortion, "mix", 1.0, 0.0, 1.0, 1.0)?;
    builder.add_parameter(distortion, "type", kind as u32 as f32, 0.0, 5.0, 1.0)?;
    builder.add_parameter(amp, "amplitude", 0.3, 0.0, 1.0, 1.0)?;

    builder.connect(osc, 0, distortion, 0, 1.0)?;
    builder.connect(distortion, 0, amp, 0, 1.0)?;

    Ok(builder.build())
}

/// Gate -> Sampler -> Amplifier over an embedded wavetable.
pub fn sample_player_graph(
    samples: &[f32],
    sample_rate: u32,
    channel_count: u32,
    base_frequency: f32,
    loop_start: u32,
    loop_end: u32,
) -> Result<Vec<u8>> {
    let mut builder = AudioGraphBuilder::new(sample_rate);

    let gate = builder.add_node(NodeType::Parameter, "gate_parameter", [100.0, 100.0], 0, 1);
    let sampler = builder.add_node(NodeType::Sampler, "main_sampler", [300.0, 100.0], 2, 1);
    let amp = builder.add_node(NodeType::Amplifier, "main_amplifier", [500.0, 100.0], 2, 1);
    let time = builder.add_node(NodeType::Parameter, "time_parameter", [100.0, 200.0], 0, 1);

    builder.add_parameter(gate, "gate", 0.0, 0.0, 1.0, 1.0)?;
    builder.add_parameter(sampler, "sample_index", 0.0, 0.0, 0.0, 1.0)?;
    builder.add_parameter(sampler, "pitch", 1.0, 0.25, 4.0, 1.0)?;
    builder.add_parameter(sampler, "start_position", 0.0, 0.0, 1.0, 1.0)?;
    builder.add_parameter(
        sampler,
        "loop",
        if loop_end > loop_start { 1.0 } else { 0.0 },
        0.0,
        1.0,
        1.0,
    )?;
    builder.add_parameter(amp, "amplitude", 0.7, 0.0, 1.0, 1.0)?;
    builder.add_parameter(time, "time", 0.0, 0.0, 10.0, 1.0)?;

    builder.connect(gate, 0, sampler, 0, 1.0)?;
    builder.connect(sampler, 0, amp, 0, 1.0)?;
    builder.connect(time, 0, sampler, 1, 0.0)?;

    builder.add_wavetable(
        "main_sample",
        samples,
        channel_count,
        base_frequency,
        loop_start,
        loop_end,
    )?;

    Ok(builder.build())
}

/// Gate -> StreamingSampler -> Amplifier over an embedded streaming tail.
#[allow(clippy::too_many_arguments)]
pub fn streaming_graph(
    name: &str,
    sample_rate: u32,
    channel_count: u32,
    bit_depth: u32,
    total_samples: u32,
    samples_per_chunk: u32,
    format: StreamFormat,
    bytes: Vec<u8>,
) -> Result<Vec<u8>> {
    let mut builder = AudioGraphBuilder::new(sample_rate);

    let gate = builder.add_node(NodeType::Parameter, "gate_parameter", [100.0, 100.0], 0, 1);
    let stream = builder.add_node(
        NodeType::StreamingSampler,
        "streaming_sampler",
        [300.0, 100.0],
        1,
        1,
    );
    let amp = builder.add_node(NodeType::Amplifier, "main_amplifier", [500.0, 100.0], 2, 1);

    builder.add_parameter(gate, "gate", 0.0, 0.0, 1.0, 1.0)?;
    builder.add_parameter(stream, "stream_index", 0.0, 0.0, 10.0, 1.0)?;
    builder.add_parameter(stream, "pitch", 1.0, 0.1, 4.0, 1.0)?;
    builder.add_parameter(stream, "start_position", 0.0, 0.0, 1.0, 1.0)?;
    builder.add_parameter(amp, "amplitude", 1.0, 0.0, 2.0, 1.0)?;

    builder.connect(gate, 0, stream, 0, 1.0)?;
    builder.connect(stream, 0, amp, 0, 1.0)?;

    builder.add_stream(
        name,
        sample_rate,
        channel_count,
        bit_depth,
        total_samples,
        samples_per_chunk,
        format,
        bytes,
    )?;

    Ok(builder.build())
}

/// Generate `duration` seconds of a sine tone as f32 samples.
pub fn sine_samples(frequency: f32, duration: f32, sample_rate: u32, amplitude: f32) -> Vec<f32> {
    let total = (duration * sample_rate as f32) as usize;
    (0..total)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (std::f32::consts::TAU * frequency * t).sin() * amplitude
        })
        .collect()
}
