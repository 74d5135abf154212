//! Decoder contract and channel adaptation
//!
//! A [`Decoder`] turns a [`Source`] into interleaved samples at its own channel
//! count and rate. The engine never talks to a decoder directly: it goes through
//! a [`DecoderHandle`], which is shared between a stream and its resampler and
//! adapts mono/stereo to the device channel count.
//!
//! # Spec changes
//! A decoder that changes channel count or rate mid-stream returns
//! `call_again = true`. Samples already written in that call still use the old
//! spec; the caller flushes them before re-reading [`Decoder::channels`] and
//! [`Decoder::rate`].

use crate::audio::channels::{mono_to_stereo, stereo_to_mono};
use crate::audio::decoders::SymphoniaDecoder;
use crate::audio::{Buffer, Sample, Source};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::io::{Seek, SeekFrom};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of one [`Decoder::decode`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Samples written to the front of the buffer. 0 without `call_again` means end of stream.
    pub produced: usize,
    /// The decoder's spec changed; re-query channels and rate before the next call
    pub call_again: bool,
}

impl Decoded {
    pub fn samples(produced: usize) -> Self {
        Self {
            produced,
            call_again: false,
        }
    }

    pub fn end_of_stream() -> Self {
        Self::default()
    }
}

/// Audio decoder
///
/// Implementations keep returning 0 after end of stream until [`rewind`](Self::rewind).
pub trait Decoder<S: Sample>: Send {
    /// Bind to `source` and read enough to know channels and rate.
    fn open(&mut self, source: Source) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Channel count of the decoded data (valid once open)
    fn channels(&self) -> u16;

    /// Sample rate of the decoded data (valid once open)
    fn rate(&self) -> u32;

    /// Fill the front of `buf` with interleaved samples.
    fn decode(&mut self, buf: &mut [S]) -> Decoded;

    /// Restart from the beginning.
    fn rewind(&mut self) -> Result<()>;

    /// Total play time, zero if unknown.
    fn duration(&self) -> Duration;

    fn seek_to_time(&mut self, pos: Duration) -> Result<()>;
}

/// Consecutive empty `call_again` results tolerated before treating a decoder as exhausted
const MAX_EMPTY_SPEC_CHANGES: usize = 8;

/// Decoder plus mono/stereo adaptation to the output channel count.
struct ChannelAdapter<S: Sample> {
    decoder: Box<dyn Decoder<S>>,
    output_channels: u16,
    stereo_buf: Buffer<S>,
}

impl<S: Sample> ChannelAdapter<S> {
    fn decode(&mut self, buf: &mut [S]) -> Decoded {
        let decoder_channels = self.decoder.channels();
        match (decoder_channels, self.output_channels) {
            (1, 2) => {
                let half = buf.len() / 2;
                let decoded = self.decoder.decode(&mut buf[..half]);
                let produced = decoded.produced.min(half);
                mono_to_stereo(&mut buf[..produced * 2]);
                Decoded {
                    produced: produced * 2,
                    call_again: decoded.call_again,
                }
            }
            (2, 1) => {
                let needed = buf.len() * 2;
                if self.stereo_buf.len() < needed {
                    self.stereo_buf.reset(needed);
                }
                let decoded = self.decoder.decode(&mut self.stereo_buf[..needed]);
                let produced = decoded.produced.min(needed);
                let frames = stereo_to_mono(buf, &self.stereo_buf[..produced]);
                Decoded {
                    produced: frames,
                    call_again: decoded.call_again,
                }
            }
            (1, 1) | (2, 2) => self.decoder.decode(buf),
            _ => Decoded::end_of_stream(),
        }
    }
}

/// Shared handle to a decoder, adapting its output to the device channel count.
///
/// Cloning the handle shares the decoder. All calls happen under the engine's
/// device lock, so the inner mutex is never contended.
pub struct DecoderHandle<S: Sample> {
    inner: Arc<Mutex<ChannelAdapter<S>>>,
}

impl<S: Sample> Clone for DecoderHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Sample> DecoderHandle<S> {
    pub fn new(decoder: Box<dyn Decoder<S>>) -> Self {
        let output_channels = decoder.channels();
        Self {
            inner: Arc::new(Mutex::new(ChannelAdapter {
                decoder,
                output_channels,
                stereo_buf: Buffer::new(0),
            })),
        }
    }

    /// Open the decoder (if not already open) and set the output channel count.
    ///
    /// # Errors
    /// - The decoder fails to open
    /// - The decoder or output channel count is not 1 or 2
    pub fn open(&self, source: Source, output_channels: u16) -> Result<()> {
        if !(1..=2).contains(&output_channels) {
            return Err(Error::UnsupportedFormat(format!(
                "Unsupported output channel count: {}",
                output_channels
            )));
        }

        let mut adapter = self.inner.lock();
        if !adapter.decoder.is_open() {
            adapter.decoder.open(source)?;
        }

        let channels = adapter.decoder.channels();
        if !(1..=2).contains(&channels) {
            return Err(Error::UnsupportedFormat(format!(
                "Decoder has {} channels, only mono and stereo are supported",
                channels
            )));
        }

        adapter.output_channels = output_channels;
        debug!(
            "Decoder opened: {} Hz, {} ch (output {} ch)",
            adapter.decoder.rate(),
            channels,
            output_channels
        );
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().decoder.is_open()
    }

    /// Channel count of the decoded data, before adaptation
    pub fn channels(&self) -> u16 {
        self.inner.lock().decoder.channels()
    }

    /// Channel count delivered by [`decode`](Self::decode)
    pub fn output_channels(&self) -> u16 {
        self.inner.lock().output_channels
    }

    pub fn rate(&self) -> u32 {
        self.inner.lock().decoder.rate()
    }

    /// Decode into `buf` at the output channel count.
    pub fn decode(&self, buf: &mut [S]) -> Decoded {
        self.inner.lock().decode(buf)
    }

    /// Fill `buf` directly from the decoder, passing through spec changes.
    ///
    /// Returns the number of samples written and whether end of stream was hit.
    /// Only a 0 result without `call_again` counts as end of stream.
    pub fn pull(&self, buf: &mut [S]) -> (usize, bool) {
        let mut adapter = self.inner.lock();
        let mut end = 0;
        let mut empty_spec_changes = 0;

        while end < buf.len() {
            let decoded = adapter.decode(&mut buf[end..]);
            end += decoded.produced;
            if decoded.produced > 0 {
                empty_spec_changes = 0;
                continue;
            }
            if !decoded.call_again {
                return (end, true);
            }
            empty_spec_changes += 1;
            if empty_spec_changes >= MAX_EMPTY_SPEC_CHANGES {
                return (end, true);
            }
        }
        (end, false)
    }

    pub fn rewind(&self) -> Result<()> {
        self.inner.lock().decoder.rewind()
    }

    pub fn duration(&self) -> Duration {
        self.inner.lock().decoder.duration()
    }

    pub fn seek_to_time(&self, pos: Duration) -> Result<()> {
        self.inner.lock().decoder.seek_to_time(pos)
    }
}

/// Creates a fresh, unopened decoder
pub type DecoderBuilder<S> = fn() -> Box<dyn Decoder<S>>;

fn build_symphonia<S: Sample>() -> Box<dyn Decoder<S>> {
    Box::new(SymphoniaDecoder::<S>::new())
}

/// Decoders tried by [`decoder_for`], in order
pub fn available_decoders<S: Sample>() -> Vec<DecoderBuilder<S>> {
    vec![build_symphonia::<S> as DecoderBuilder<S>]
}

/// Find a decoder that accepts `source`.
///
/// Each candidate is opened against the source; the first that succeeds is
/// returned already open. The source position is restored after every rejection.
/// Returns `None` if nothing recognises the data.
pub fn decoder_for<S: Sample>(source: &Source) -> Option<Box<dyn Decoder<S>>> {
    decoder_from(source, &available_decoders::<S>())
}

/// [`decoder_for`] over an explicit candidate list.
pub fn decoder_from<S: Sample>(
    source: &Source,
    candidates: &[DecoderBuilder<S>],
) -> Option<Box<dyn Decoder<S>>> {
    let mut cursor = source.clone();
    let start = match cursor.stream_position() {
        Ok(pos) => pos,
        Err(e) => {
            warn!("Cannot probe {}: {}", source.name(), e);
            return None;
        }
    };

    for build in candidates {
        let mut decoder = build();
        match decoder.open(source.clone()) {
            Ok(()) => return Some(decoder),
            Err(e) => {
                debug!("Decoder rejected {}: {}", source.name(), e);
                if let Err(e) = cursor.seek(SeekFrom::Start(start)) {
                    warn!("Failed to restore position of {}: {}", source.name(), e);
                    return None;
                }
            }
        }
    }
    None
}
