//! Audio node-graph builder for TAF assets.
//!
//! Assembles AUDI chunk payloads: typed DSP nodes, port connections,
//! parameter windows and embedded wavetable or streaming-audio tails.
//! The builder validates topology (node ids, port indices, parameter
//! windows) and computes descriptor offsets at emission time; it never
//! evaluates the graph itself. The [`presets`] module carries the stock
//! graphs the asset tooling emits, from plain oscillator chains to the
//! mixer, ADSR, filter-sweep and distortion demos.
//!
//! # Example
//!
//! ```
//! use taf_audio::{AudioGraphBuilder, NodeType};
//!
//! let mut builder = AudioGraphBuilder::new(48000);
//! let osc = builder.add_node(NodeType::Oscillator, "osc", [100.0, 100.0], 1, 1);
//! let amp = builder.add_node(NodeType::Amplifier, "amp", [300.0, 100.0], 2, 1);
//! builder.add_parameter(osc, "frequency", 440.0, 20.0, 20000.0, 2.0)?;
//! builder.connect(osc, 0, amp, 0, 1.0)?;
//! let payload = builder.build();
//! # Ok::<(), taf_audio::Error>(())
//! ```

mod builder;
mod error;

pub mod presets;

pub use builder::{AudioGraphBuilder, NodeId};
pub use error::{Error, Result};

// Schema types callers commonly need alongside the builder.
pub use taf_asset::chunks::audio::{NodeType, StreamFormat};
