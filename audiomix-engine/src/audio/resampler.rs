//! Per-stream sample-rate conversion
//!
//! [`Resampler`] pulls from a shared [`DecoderHandle`] into an input window,
//! converts through a pluggable [`ResamplerBackend`] into an output window,
//! and hands out as many samples as the caller asks for.
//!
//! # Buffer sizing
//! - output = `channels * chunk_size`
//! - input = output when rates match (plain copy, backend unused), otherwise
//!   `ceil(output * src / dst)` rounded up to a whole frame
//!
//! # Spec changes
//! When the decoder reports a spec change, everything already buffered is
//! pushed through under the old spec first. If the caller's buffer fills up
//! before that is done, the change stays pending and is applied at the start of
//! a later call, once the buffers are empty. The decoder's current rate is read
//! at that point, so the newest spec always wins.

use crate::audio::{DecoderHandle, Sample, WindowedBuffer};
use crate::error::{Error, Result};
use tracing::{debug, warn};

/// Lowest accepted source rate
pub const MIN_SOURCE_RATE: u32 = 4_000;
/// Highest accepted source rate
pub const MAX_SOURCE_RATE: u32 = 192_000;

/// Sample-rate conversion algorithm
pub trait ResamplerBackend<S: Sample>: Send {
    /// (Re)initialise for a new rate pair.
    ///
    /// On error the backend is considered disabled until the next successful call.
    fn adjust_for_output_spec(&mut self, dst_rate: u32, src_rate: u32, channels: u16) -> Result<()>;

    /// Convert as much of `src` into `dst` as fits.
    ///
    /// Both buffers are interleaved at the configured channel count.
    /// Returns `(produced, consumed)` in samples.
    fn do_resampling(&mut self, dst: &mut [S], src: &[S]) -> (usize, usize);

    /// Drop any internal filter state or buffered samples.
    fn discard_pending_samples(&mut self);
}

/// Double-buffered sample-rate converter over a [`ResamplerBackend`].
pub struct Resampler<S: Sample> {
    backend: Box<dyn ResamplerBackend<S>>,
    backend_ready: bool,
    decoder: Option<DecoderHandle<S>>,
    dst_rate: u32,
    src_rate: u32,
    channels: u16,
    chunk_size: usize,
    input: WindowedBuffer<S>,
    output: WindowedBuffer<S>,
    pending_spec_change: bool,
}

impl<S: Sample> Resampler<S> {
    pub fn new(backend: Box<dyn ResamplerBackend<S>>) -> Self {
        Self {
            backend,
            backend_ready: false,
            decoder: None,
            dst_rate: 0,
            src_rate: 0,
            channels: 0,
            chunk_size: 0,
            input: WindowedBuffer::new(0),
            output: WindowedBuffer::new(0),
            pending_spec_change: false,
        }
    }

    /// Attach the decoder to pull from.
    pub fn set_decoder(&mut self, decoder: DecoderHandle<S>) {
        self.decoder = Some(decoder);
    }

    /// Configure for an output rate, channel count and chunk size (in frames).
    ///
    /// The source rate is read from the decoder and clamped to
    /// [`MIN_SOURCE_RATE`, `MAX_SOURCE_RATE`].
    ///
    /// # Errors
    /// - No decoder attached
    /// - Zero rate, channels or chunk size
    /// - The backend rejects the rate pair (resampling then produces nothing).
    ///   Equal rates never reach the backend.
    pub fn set_spec(&mut self, dst_rate: u32, channels: u16, chunk_size: usize) -> Result<()> {
        let decoder = self
            .decoder
            .as_ref()
            .ok_or_else(|| Error::InvalidState("Resampler has no decoder".to_string()))?;
        if dst_rate == 0 || channels == 0 || chunk_size == 0 {
            return Err(Error::Resampler(format!(
                "Invalid resampler spec: {} Hz, {} ch, chunk {}",
                dst_rate, channels, chunk_size
            )));
        }

        self.dst_rate = dst_rate;
        self.channels = channels;
        self.chunk_size = chunk_size;
        self.src_rate = decoder.rate().clamp(MIN_SOURCE_RATE, MAX_SOURCE_RATE);
        self.adjust_buffer_sizes();

        debug!(
            "Resampler spec: {} Hz -> {} Hz, {} ch, input {} / output {} samples",
            self.src_rate,
            self.dst_rate,
            self.channels,
            self.input.capacity(),
            self.output.capacity()
        );

        if self.src_rate == self.dst_rate {
            // Plain copy, the backend is not consulted until the rates differ
            self.backend_ready = false;
            return Ok(());
        }

        match self
            .backend
            .adjust_for_output_spec(self.dst_rate, self.src_rate, self.channels)
        {
            Ok(()) => {
                self.backend_ready = true;
                Ok(())
            }
            Err(e) => {
                warn!("Resampler backend disabled: {}", e);
                self.backend_ready = false;
                Err(e)
            }
        }
    }

    /// Destination rate
    pub fn current_rate(&self) -> u32 {
        self.dst_rate
    }

    /// Source rate after clamping
    pub fn source_rate(&self) -> u32 {
        self.src_rate
    }

    pub fn current_channels(&self) -> u16 {
        self.channels
    }

    /// Chunk size in frames
    pub fn current_chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn input_capacity(&self) -> usize {
        self.input.capacity()
    }

    pub fn output_capacity(&self) -> usize {
        self.output.capacity()
    }

    pub fn has_pending_spec_change(&self) -> bool {
        self.pending_spec_change
    }

    /// Fill `dst` with resampled audio.
    ///
    /// Returns the number of samples written, never more than `dst.len()`.
    /// Less than `dst.len()` means the decoder reached end of stream.
    pub fn resample(&mut self, dst: &mut [S]) -> usize {
        let Some(decoder) = self.decoder.clone() else {
            return 0;
        };
        let mut total = 0;

        if self.pending_spec_change {
            if !self.drain(dst, &mut total) {
                return total;
            }
            self.pending_spec_change = false;
            self.apply_spec_change();
        }

        while total < dst.len() {
            let mut decoder_eof = false;
            let mut decoded = 0;

            if self.input.has_free_tail() {
                let result = decoder.decode(self.input.free_tail_mut());
                decoded = result.produced;
                self.input.commit(result.produced);

                if result.call_again {
                    if !self.drain(dst, &mut total) {
                        self.pending_spec_change = true;
                        return total;
                    }
                    self.apply_spec_change();
                    continue;
                }
                decoder_eof = result.produced == 0;
            }

            let before = (self.input.available(), self.output.available());
            let moved = self.step(&mut dst[total..]);
            total += moved;

            if decoder_eof {
                // Flush what is still buffered without asking the decoder again
                while total < dst.len() {
                    let moved = self.step(&mut dst[total..]);
                    if moved == 0 {
                        break;
                    }
                    total += moved;
                }
                break;
            }

            let progressed = decoded > 0
                || moved > 0
                || before != (self.input.available(), self.output.available());
            if !progressed {
                break;
            }
        }

        total
    }

    /// Drop buffered samples and backend state (after a seek or rewind).
    pub fn discard_pending_samples(&mut self) {
        self.input.clear();
        self.output.clear();
        self.backend.discard_pending_samples();
    }

    fn adjust_buffer_sizes(&mut self) {
        let channels = self.channels as usize;
        let out_size = channels * self.chunk_size;
        let in_size = if self.src_rate == self.dst_rate {
            out_size
        } else {
            let scaled = (out_size as u64 * self.src_rate as u64).div_ceil(self.dst_rate as u64);
            let in_size = (scaled as usize).next_multiple_of(channels);
            // Interpolating backends need at least two frames to work with
            in_size.max(2 * channels)
        };

        self.output.reset(out_size);
        self.input.resize_keeping(in_size);
    }

    fn apply_spec_change(&mut self) {
        if let Err(e) = self.set_spec(self.dst_rate, self.channels, self.chunk_size) {
            warn!("Failed to apply decoder spec change: {}", e);
        }
    }

    /// Push buffered data out under the current spec.
    ///
    /// Returns true once both windows are empty, false if `dst` filled up first.
    /// Input the backend refuses to take any further is dropped.
    fn drain(&mut self, dst: &mut [S], total: &mut usize) -> bool {
        loop {
            if self.input.is_empty() && self.output.is_empty() {
                return true;
            }
            if *total >= dst.len() {
                return false;
            }

            let before = (self.input.available(), self.output.available());
            let moved = self.step(&mut dst[*total..]);
            *total += moved;

            if moved == 0 && before == (self.input.available(), self.output.available()) {
                if !self.output.is_empty() {
                    return false;
                }
                debug!(
                    "Dropping {} samples the backend cannot convert",
                    self.input.available()
                );
                self.input.clear();
                return true;
            }
        }
    }

    /// Convert from the input window, relocate, and move output into `dst`.
    fn step(&mut self, dst: &mut [S]) -> usize {
        self.resample_from_input();
        self.input.relocate();
        let moved = self.move_from_output(dst);
        self.output.relocate();
        moved
    }

    fn resample_from_input(&mut self) {
        let in_len = self.input.available();
        if in_len == 0 {
            return;
        }

        let Self {
            backend,
            backend_ready,
            input,
            output,
            src_rate,
            dst_rate,
            ..
        } = self;

        if src_rate == dst_rate {
            let count = in_len.min(output.free_tail_mut().len());
            output.free_tail_mut()[..count].copy_from_slice(&input.readable()[..count]);
            output.commit(count);
            input.consume(count);
        } else if *backend_ready {
            let (produced, consumed) =
                backend.do_resampling(output.free_tail_mut(), input.readable());
            output.commit(produced);
            input.consume(consumed.min(in_len));
        }
    }

    fn move_from_output(&mut self, dst: &mut [S]) -> usize {
        let count = self.output.available().min(dst.len());
        if count == 0 {
            return 0;
        }
        dst[..count].copy_from_slice(&self.output.readable()[..count]);
        self.output.consume(count);
        count
    }
}
