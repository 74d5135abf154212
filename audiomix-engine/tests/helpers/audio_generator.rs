//! WAV fixture generation

use hound::{WavSpec, WavWriter};
use std::path::Path;

/// Write a 16-bit WAV holding a constant level on every channel.
///
/// # Arguments
/// * `path` - Output file path
/// * `rate` - Sample rate in Hz
/// * `channels` - Channel count
/// * `frames` - Number of frames
/// * `level` - Sample value as a fraction of full scale (-1.0 to 1.0)
pub fn write_constant_wav(
    path: &Path,
    rate: u32,
    channels: u16,
    frames: usize,
    level: f32,
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    let sample = (level * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
    for _ in 0..frames * channels as usize {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
