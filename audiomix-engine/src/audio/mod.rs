//! Audio building blocks
//!
//! Sample types, buffers, format conversion, decoding and resampling.
//! Device output lives in [`output`].

pub mod backends;
pub mod buffer;
pub mod channels;
pub mod convert;
pub mod decoder;
pub mod decoders;
pub mod output;
pub mod resampler;
pub mod sample;
pub mod source;

pub use buffer::{Buffer, WindowedBuffer};
pub use convert::{converter_for, ConverterFn, SampleFormat};
pub use decoder::{decoder_for, Decoded, Decoder, DecoderHandle};
pub use output::{AudioOutput, DeviceSpec};
pub use resampler::{Resampler, ResamplerBackend};
pub use sample::Sample;
pub use source::Source;
