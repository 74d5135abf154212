//! # audiomix engine
//!
//! Real-time playback of multiple simultaneous audio sources:
//! - Decoding through the [`audio::Decoder`] contract
//! - Per-stream sample-rate conversion ([`audio::Resampler`])
//! - Volume, pan, fades and signal processors per stream
//! - Mixing into one interleaved buffer and conversion to the device format
//!
//! The pipeline is generic over the internal sample type ([`audio::Sample`]),
//! instantiated for `f32` and `i32`.

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod system;

pub use audio::{DeviceSpec, Sample, SampleFormat, Source};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use playback::{Mixer, Processor, Stream};
pub use system::AudioSystem;
