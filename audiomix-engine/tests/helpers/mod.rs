//! Shared helpers for audiomix-engine integration tests
//!
//! - Scripted decoders with known output (constant level, mid-stream spec changes)
//! - A mixer on a manual clock at 1 kHz with 10-frame buffers, so one mixing
//!   pass covers exactly 10 ms
//! - WAV fixture generation with hound

#![allow(dead_code)]

pub mod audio_generator;
pub mod decoders;

pub use audio_generator::write_constant_wav;
pub use decoders::{ConstDecoder, FailingBackend, SegmentDecoder};

use audiomix_common::{FadeCurve, ManualClock};
use audiomix_engine::{DeviceSpec, Mixer, Sample, SampleFormat, Source, Stream};
use std::sync::Arc;

pub const TEST_RATE: u32 = 1000;
pub const TEST_FRAMES: u32 = 10;
/// Duration of one mixing pass at the test spec
pub const PASS_MS: i64 = 10;

/// Mixer with a manual clock at tick 0
pub fn test_mixer<S: Sample>(channels: u16) -> (Mixer<S>, Arc<ManualClock>) {
    test_mixer_with(channels, SampleFormat::F32, FadeCurve::Cubic)
}

pub fn test_mixer_with<S: Sample>(
    channels: u16,
    format: SampleFormat,
    curve: FadeCurve,
) -> (Mixer<S>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    let mixer = Mixer::with_options(
        DeviceSpec::new(TEST_RATE, channels, TEST_FRAMES, format),
        clock.clone(),
        curve,
    )
    .expect("valid test spec");
    (mixer, clock)
}

/// Stream over a [`ConstDecoder`] at the mixer rate, without resampling
pub fn const_stream<S: Sample>(mixer: &Mixer<S>, value: S, channels: u16, frames: usize) -> Stream<S> {
    Stream::new(
        mixer,
        Source::from_bytes(Vec::new()),
        Box::new(ConstDecoder::new(value, channels, TEST_RATE, frames)),
        None,
        true,
    )
}

/// Run one mixing pass and return the mixed samples
pub fn mix_pass<S: Sample>(mixer: &Mixer<S>) -> Vec<S> {
    let mut out = vec![S::SILENCE; mixer.spec().buffer_samples()];
    mixer.mix(&mut out);
    out
}

pub fn assert_all_close(samples: &[f32], expected: f32) {
    for (i, &sample) in samples.iter().enumerate() {
        assert!(
            (sample - expected).abs() < 1e-6,
            "sample {} is {}, expected {}",
            i,
            sample,
            expected
        );
    }
}
