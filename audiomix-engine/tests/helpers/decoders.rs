//! Scripted decoders and resampler backends

use audiomix_engine::audio::{Decoded, Decoder, ResamplerBackend};
use audiomix_engine::error::{Error, Result};
use audiomix_engine::{Sample, Source};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Produces `frames` frames of a constant value, then end of stream
pub struct ConstDecoder<S: Sample> {
    value: S,
    channels: u16,
    rate: u32,
    frames: usize,
    pos: usize,
    open: bool,
}

impl<S: Sample> ConstDecoder<S> {
    pub fn new(value: S, channels: u16, rate: u32, frames: usize) -> Self {
        Self {
            value,
            channels,
            rate,
            frames,
            pos: 0,
            open: false,
        }
    }
}

impl<S: Sample> Decoder<S> for ConstDecoder<S> {
    fn open(&mut self, _source: Source) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn rate(&self) -> u32 {
        self.rate
    }

    fn decode(&mut self, buf: &mut [S]) -> Decoded {
        let channels = self.channels as usize;
        let frames = (buf.len() / channels).min(self.frames - self.pos);
        buf[..frames * channels].fill(self.value);
        self.pos += frames;
        Decoded::samples(frames * channels)
    }

    fn rewind(&mut self) -> Result<()> {
        self.pos = 0;
        Ok(())
    }

    fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames as f64 / self.rate as f64)
    }

    fn seek_to_time(&mut self, pos: Duration) -> Result<()> {
        let frame = (pos.as_micros() * self.rate as u128 / 1_000_000) as usize;
        self.pos = frame.min(self.frames);
        Ok(())
    }
}

/// Constant output played as a list of `(channels, rate, frames)` segments.
///
/// The call that delivers the last frame of a segment reports `call_again`;
/// `channels()` and `rate()` already describe the next segment by then.
pub struct SegmentDecoder<S: Sample> {
    value: S,
    segments: Vec<(u16, u32, usize)>,
    index: usize,
    pos: usize,
    open: bool,
}

impl<S: Sample> SegmentDecoder<S> {
    pub fn new(value: S, segments: Vec<(u16, u32, usize)>) -> Self {
        assert!(!segments.is_empty(), "at least one segment");
        Self {
            value,
            segments,
            index: 0,
            pos: 0,
            open: false,
        }
    }

    fn segment(&self) -> (u16, u32, usize) {
        self.segments[self.index.min(self.segments.len() - 1)]
    }
}

impl<S: Sample> Decoder<S> for SegmentDecoder<S> {
    fn open(&mut self, _source: Source) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn channels(&self) -> u16 {
        self.segment().0
    }

    fn rate(&self) -> u32 {
        self.segment().1
    }

    fn decode(&mut self, buf: &mut [S]) -> Decoded {
        let (channels, _, limit) = self.segment();
        let channels = channels as usize;
        let frames = (buf.len() / channels).min(limit - self.pos);
        buf[..frames * channels].fill(self.value);
        self.pos += frames;

        if self.pos == limit && self.index + 1 < self.segments.len() {
            self.index += 1;
            self.pos = 0;
            return Decoded {
                produced: frames * channels,
                call_again: true,
            };
        }
        Decoded::samples(frames * channels)
    }

    fn rewind(&mut self) -> Result<()> {
        self.index = 0;
        self.pos = 0;
        Ok(())
    }

    fn duration(&self) -> Duration {
        let secs = self
            .segments
            .iter()
            .map(|&(_, rate, frames)| frames as f64 / rate as f64)
            .sum();
        Duration::from_secs_f64(secs)
    }

    fn seek_to_time(&mut self, _pos: Duration) -> Result<()> {
        Err(Error::InvalidState("seeking not scripted".to_string()))
    }
}

/// Backend whose initialisation fails while `fail` is set
pub struct FailingBackend {
    pub fail: Arc<AtomicBool>,
}

impl<S: Sample> ResamplerBackend<S> for FailingBackend {
    fn adjust_for_output_spec(&mut self, dst_rate: u32, src_rate: u32, _channels: u16) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Resampler(format!(
                "refusing {} Hz -> {} Hz",
                src_rate, dst_rate
            )));
        }
        Ok(())
    }

    fn do_resampling(&mut self, dst: &mut [S], src: &[S]) -> (usize, usize) {
        let count = dst.len().min(src.len());
        dst[..count].copy_from_slice(&src[..count]);
        (count, count)
    }

    fn discard_pending_samples(&mut self) {}
}
