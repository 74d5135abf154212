//! Playable streams
//!
//! A [`Stream`] binds a decoder (and optionally a resampler) to an input
//! [`Source`] and exposes playback control. While playing, the stream is listed
//! in its [`Mixer`]'s registry and pulled from on the device thread.
//!
//! Every mutator takes the mixer's device lock before the stream's own lock, so
//! a change is never observed half-way through a mixing pass.

use crate::audio::{Decoder, DecoderHandle, DeviceSpec, Resampler, Sample, Source};
use crate::error::{Error, Result};
use crate::playback::fade::{duration_ms, Fader};
use crate::playback::mixer::Mixer;
use crate::playback::processor::{same_processor, SharedProcessor};
use parking_lot::Mutex;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Loop and finish callback. Invoked on the device thread, outside any lock.
pub type StreamCallback<S> = Arc<dyn Fn(&Stream<S>) + Send + Sync>;

/// Coarse playback state of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Closed,
    Stopped,
    Playing,
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Closed => write!(f, "closed"),
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// Result of one pull from a stream during a mixing pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FillOutcome {
    /// One past the last sample written
    pub(crate) end: usize,
    /// Completed loops (rewinds) during the pull
    pub(crate) loops: u32,
    /// The last wanted iteration ended during the pull
    pub(crate) finished: bool,
}

pub(crate) struct StreamShared<S: Sample> {
    pub(crate) state: Mutex<StreamState<S>>,
}

pub(crate) struct StreamState<S: Sample> {
    decoder: DecoderHandle<S>,
    resampler: Option<Resampler<S>>,
    source: Source,
    close_source: bool,
    processors: Vec<SharedProcessor<S>>,
    is_open: bool,
    is_playing: bool,
    pub(crate) is_paused: bool,
    pub(crate) is_muted: bool,
    volume: f32,
    stereo_position: f32,
    pub(crate) fader: Fader,
    current_iteration: u32,
    wanted_iterations: u32,
    pub(crate) playback_start_tick: i64,
    pub(crate) finish_callback: Option<StreamCallback<S>>,
    pub(crate) loop_callback: Option<StreamCallback<S>>,
}

impl<S: Sample> StreamState<S> {
    fn open(&mut self, spec: DeviceSpec) -> Result<()> {
        if self.is_open {
            return Ok(());
        }
        if self.source.is_closed() {
            return Err(Error::Open(format!(
                "No readable input for stream {}",
                self.source.name()
            )));
        }

        self.decoder.open(self.source.clone(), spec.channels)?;
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.set_spec(spec.rate, spec.channels, spec.frame_size as usize)?;
        }

        self.is_open = true;
        debug!("Stream opened: {}", self.source.name());
        Ok(())
    }

    fn loops_exhausted(&self) -> bool {
        self.wanted_iterations != 0 && self.current_iteration >= self.wanted_iterations
    }

    /// Playing, not paused, and iterations remaining
    pub(crate) fn is_mixable(&self) -> bool {
        self.is_playing && !self.is_paused && !self.loops_exhausted()
    }

    /// Rewind and mark stopped. Registry removal is the caller's job.
    pub(crate) fn halt(&mut self) {
        if self.is_open {
            if let Err(e) = self.decoder.rewind() {
                debug!("Rewind on stop failed for {}: {}", self.source.name(), e);
            }
            self.discard_buffered();
        }
        self.is_playing = false;
        self.is_paused = false;
    }

    fn discard_buffered(&mut self) {
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.discard_pending_samples();
        }
    }

    fn pull(&mut self, buf: &mut [S]) -> (usize, bool) {
        match self.resampler.as_mut() {
            Some(resampler) => {
                let produced = resampler.resample(buf);
                (produced, produced < buf.len())
            }
            None => self.decoder.pull(buf),
        }
    }

    /// Fill `buf[offset..]`, rewinding at end of stream while iterations remain.
    pub(crate) fn fill(&mut self, buf: &mut [S], offset: usize) -> FillOutcome {
        let mut outcome = FillOutcome {
            end: offset,
            loops: 0,
            finished: false,
        };
        let mut after_rewind = false;

        while outcome.end < buf.len() {
            let (produced, eof) = self.pull(&mut buf[outcome.end..]);
            outcome.end += produced;
            let stalled = after_rewind && produced == 0;
            after_rewind = false;
            if !eof {
                continue;
            }

            if stalled {
                warn!("Stream {} produced nothing after rewind, stopping", self.source.name());
                self.finish(&mut outcome);
                break;
            }
            if let Err(e) = self.decoder.rewind() {
                warn!("Failed to rewind {}: {}", self.source.name(), e);
                self.finish(&mut outcome);
                break;
            }

            self.current_iteration = self.current_iteration.saturating_add(1);
            if self.loops_exhausted() {
                self.finish(&mut outcome);
                break;
            }
            outcome.loops += 1;
            after_rewind = true;
        }

        outcome
    }

    fn finish(&mut self, outcome: &mut FillOutcome) {
        self.is_playing = false;
        self.discard_buffered();
        outcome.finished = true;
    }

    /// Run processors in order over `samples`, using `scratch` as output.
    pub(crate) fn run_processors(&self, samples: &mut [S], scratch: &mut [S]) {
        for processor in &self.processors {
            processor.lock().process(scratch, samples);
            samples.copy_from_slice(scratch);
        }
    }

    /// Left and right multipliers for this pass
    pub(crate) fn channel_gains(&self, channels: usize) -> (f32, f32) {
        let base = self.volume * self.fader.gain();
        let (mut left, mut right) = (base, base);
        if channels > 1 {
            if self.stereo_position < 0.0 {
                right *= 1.0 + self.stereo_position;
            } else if self.stereo_position > 0.0 {
                left *= 1.0 - self.stereo_position;
            }
        }
        (left, right)
    }
}

impl<S: Sample> Drop for StreamState<S> {
    fn drop(&mut self) {
        if self.close_source {
            self.source.close();
        }
    }
}

/// A decodable input that can be played through a [`Mixer`].
///
/// Dropping the stream stops it and removes it from the mixer before its
/// decoder is released.
pub struct Stream<S: Sample = f32> {
    shared: Arc<StreamShared<S>>,
    mixer: Mixer<S>,
    owner: bool,
}

impl<S: Sample> Stream<S> {
    /// Create a stream over `source`.
    ///
    /// # Arguments
    /// * `decoder` - Unopened decoder; opened against `source` by [`Stream::open`]
    /// * `resampler` - Converts the decoder rate to the mixer rate; without one
    ///   the decoder output is used as is
    /// * `close_source` - Close `source` when the stream is dropped
    pub fn new(
        mixer: &Mixer<S>,
        source: Source,
        decoder: Box<dyn Decoder<S>>,
        mut resampler: Option<Resampler<S>>,
        close_source: bool,
    ) -> Self {
        let decoder = DecoderHandle::new(decoder);
        if let Some(resampler) = resampler.as_mut() {
            resampler.set_decoder(decoder.clone());
        }

        let state = StreamState {
            decoder,
            resampler,
            source,
            close_source,
            processors: Vec::new(),
            is_open: false,
            is_playing: false,
            is_paused: false,
            is_muted: false,
            volume: 1.0,
            stereo_position: 0.0,
            fader: Fader::new(),
            current_iteration: 0,
            wanted_iterations: 0,
            playback_start_tick: 0,
            finish_callback: None,
            loop_callback: None,
        };

        Self {
            shared: Arc::new(StreamShared {
                state: Mutex::new(state),
            }),
            mixer: mixer.clone(),
            owner: true,
        }
    }

    /// Create a stream reading from a file.
    ///
    /// A file that cannot be opened is logged here and reported by
    /// [`Stream::open`] or [`Stream::play`].
    pub fn from_file(
        mixer: &Mixer<S>,
        path: impl AsRef<Path>,
        decoder: Box<dyn Decoder<S>>,
        resampler: Option<Resampler<S>>,
    ) -> Self {
        let path = path.as_ref();
        let source = match Source::from_file(path) {
            Ok(source) => source,
            Err(e) => {
                warn!("{}", e);
                Source::empty(path.display().to_string())
            }
        };
        Self::new(mixer, source, decoder, resampler, true)
    }

    /// Non-owning handle passed to callbacks
    pub(crate) fn handle(mixer: Mixer<S>, shared: Arc<StreamShared<S>>) -> Self {
        Self {
            shared,
            mixer,
            owner: false,
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut StreamState<S>) -> R) -> R {
        let _device = self.mixer.lock_device();
        let mut state = self.shared.state.lock();
        f(&mut state)
    }

    /// Open the decoder and configure the resampler. Does nothing if already open.
    ///
    /// # Errors
    /// - The source is missing or unreadable
    /// - The decoder rejects the input
    /// - The resampler cannot be configured for the output spec
    pub fn open(&self) -> Result<()> {
        let spec = self.mixer.spec();
        self.with_state(|state| state.open(spec))
    }

    /// Start playback, opening first if needed.
    ///
    /// # Arguments
    /// * `iterations` - Times to play through; 0 loops forever
    /// * `fade` - Fade-in time; zero starts at full volume
    ///
    /// Playing an already playing stream does nothing.
    pub fn play(&self, iterations: u32, fade: Duration) -> Result<()> {
        let spec = self.mixer.spec();
        let _device = self.mixer.lock_device();
        let mut state = self.shared.state.lock();

        state.open(spec)?;
        if state.is_playing {
            return Ok(());
        }

        let now = self.mixer.now_ms();
        state.current_iteration = 0;
        state.wanted_iterations = iterations;
        state.playback_start_tick = now;
        if fade.is_zero() {
            state.fader.reset();
        } else {
            state.fader.fade_in(now, duration_ms(fade));
        }
        state.is_paused = false;
        state.is_playing = true;
        self.mixer.register(&self.shared);

        debug!(
            "Playing {} (iterations: {}, fade: {:?})",
            state.source.name(),
            iterations,
            fade
        );
        Ok(())
    }

    /// Stop playback and rewind.
    ///
    /// With a non-zero `fade` a playing stream fades out first and stops when
    /// the fade completes. A paused stream stops immediately.
    pub fn stop(&self, fade: Duration) {
        let _device = self.mixer.lock_device();
        let mut state = self.shared.state.lock();

        if !fade.is_zero() && state.is_playing && !state.is_paused {
            state.fader.fade_out(self.mixer.now_ms(), duration_ms(fade), true);
            return;
        }

        self.mixer.deregister(&self.shared);
        state.halt();
    }

    /// Pause playback, optionally fading out first.
    pub fn pause(&self, fade: Duration) {
        let now = self.mixer.now_ms();
        self.with_state(|state| {
            if !state.is_playing || state.is_paused {
                return;
            }
            if fade.is_zero() {
                state.is_paused = true;
            } else {
                state.fader.fade_out(now, duration_ms(fade), false);
            }
        });
    }

    /// Resume a paused stream, optionally fading in.
    pub fn resume(&self, fade: Duration) {
        let now = self.mixer.now_ms();
        self.with_state(|state| {
            if !state.is_paused {
                return;
            }
            if fade.is_zero() {
                state.fader.reset();
            } else {
                state.fader.fade_in(now, duration_ms(fade));
            }
            state.is_paused = false;
        });
    }

    /// Seek back to the start of the input.
    pub fn rewind(&self) -> Result<()> {
        let spec = self.mixer.spec();
        self.with_state(|state| {
            state.open(spec)?;
            state.decoder.rewind()?;
            state.discard_buffered();
            Ok(())
        })
    }

    /// Seek to `position` from the start of the input.
    ///
    /// # Errors
    /// Returns [`Error::InvalidState`] if the stream has not been opened.
    pub fn seek_to_time(&self, position: Duration) -> Result<()> {
        self.with_state(|state| {
            if !state.is_open {
                return Err(Error::InvalidState(format!(
                    "Cannot seek {}: stream is not open",
                    state.source.name()
                )));
            }
            state.decoder.seek_to_time(position)?;
            state.discard_buffered();
            Ok(())
        })
    }

    /// Total length of the input, or zero if unknown.
    pub fn duration(&self) -> Duration {
        self.with_state(|state| {
            if state.is_open {
                state.decoder.duration()
            } else {
                Duration::ZERO
            }
        })
    }

    /// Set the volume. Negative values are treated as 0.
    pub fn set_volume(&self, volume: f32) {
        let volume = if volume.is_nan() { 0.0 } else { volume.max(0.0) };
        self.with_state(|state| state.volume = volume);
    }

    pub fn volume(&self) -> f32 {
        self.with_state(|state| state.volume)
    }

    /// Set the stereo position: -1.0 is full left, 1.0 full right.
    pub fn set_stereo_position(&self, position: f32) {
        let position = if position.is_nan() {
            0.0
        } else {
            position.clamp(-1.0, 1.0)
        };
        self.with_state(|state| state.stereo_position = position);
    }

    pub fn stereo_position(&self) -> f32 {
        self.with_state(|state| state.stereo_position)
    }

    pub fn mute(&self) {
        self.with_state(|state| state.is_muted = true);
    }

    pub fn unmute(&self) {
        self.with_state(|state| state.is_muted = false);
    }

    pub fn is_muted(&self) -> bool {
        self.with_state(|state| state.is_muted)
    }

    pub fn is_open(&self) -> bool {
        self.with_state(|state| state.is_open)
    }

    pub fn is_playing(&self) -> bool {
        self.with_state(|state| state.is_playing)
    }

    pub fn is_paused(&self) -> bool {
        self.with_state(|state| state.is_paused)
    }

    pub fn state(&self) -> PlaybackState {
        self.with_state(|state| {
            if !state.is_open {
                PlaybackState::Closed
            } else if !state.is_playing {
                PlaybackState::Stopped
            } else if state.is_paused {
                PlaybackState::Paused
            } else {
                PlaybackState::Playing
            }
        })
    }

    /// Completed iterations since the last [`Stream::play`]
    pub fn current_iteration(&self) -> u32 {
        self.with_state(|state| state.current_iteration)
    }

    /// Iterations requested by the last [`Stream::play`] (0 = forever)
    pub fn wanted_iterations(&self) -> u32 {
        self.with_state(|state| state.wanted_iterations)
    }

    /// Called once when the last iteration ends.
    pub fn set_finish_callback<F>(&self, callback: F)
    where
        F: Fn(&Stream<S>) + Send + Sync + 'static,
    {
        let callback: StreamCallback<S> = Arc::new(callback);
        self.with_state(|state| state.finish_callback = Some(callback));
    }

    pub fn unset_finish_callback(&self) {
        self.with_state(|state| state.finish_callback = None);
    }

    /// Called each time the stream rewinds to start another iteration.
    pub fn set_loop_callback<F>(&self, callback: F)
    where
        F: Fn(&Stream<S>) + Send + Sync + 'static,
    {
        let callback: StreamCallback<S> = Arc::new(callback);
        self.with_state(|state| state.loop_callback = Some(callback));
    }

    pub fn unset_loop_callback(&self) {
        self.with_state(|state| state.loop_callback = None);
    }

    /// Append a processor. Adding the same processor twice has no effect.
    pub fn add_processor(&self, processor: SharedProcessor<S>) {
        self.with_state(|state| {
            if !state
                .processors
                .iter()
                .any(|p| same_processor(p, &processor))
            {
                state.processors.push(processor);
            }
        });
    }

    /// Remove a processor. Returns false if it was not attached.
    pub fn remove_processor(&self, processor: &SharedProcessor<S>) -> bool {
        self.with_state(|state| {
            let before = state.processors.len();
            state.processors.retain(|p| !same_processor(p, processor));
            state.processors.len() != before
        })
    }

    pub fn clear_processors(&self) {
        self.with_state(|state| state.processors.clear());
    }

    /// Whether the mixer currently lists this stream
    pub fn is_registered(&self) -> bool {
        self.mixer.is_registered(&self.shared)
    }

    /// The mixer this stream plays through
    pub fn mixer(&self) -> &Mixer<S> {
        &self.mixer
    }
}

impl<S: Sample> fmt::Debug for Stream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl<S: Sample> Drop for Stream<S> {
    fn drop(&mut self) {
        if !self.owner {
            return;
        }
        let _device = self.mixer.lock_device();
        self.mixer.deregister(&self.shared);
        self.shared.state.lock().halt();
    }
}
