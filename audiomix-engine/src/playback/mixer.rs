//! Stream registry and mixing callback
//!
//! # Architecture
//!
//! The mixer owns two locks:
//! - The **device lock** guards the mix buffers. The device callback holds it for
//!   a whole pass, and every stream mutator takes it before touching stream
//!   state, so application threads never observe a half-mixed stream.
//! - The **registry lock** guards the list of playing streams. It is only held
//!   long enough to copy the list.
//!
//! Lock order is device, then stream state, then registry.
//!
//! # Mixing pass
//!
//! 1. Copy the registry, skip exhausted and paused streams
//! 2. Leave leading silence for streams that started inside this buffer
//! 3. Pull samples (rewinding at end of stream while loops remain)
//! 4. Run processors, then fades and pan
//! 5. Sum into the mix buffer and convert to the device format
//! 6. After the device lock is released, fire loop and finish callbacks
//!
//! Nothing here allocates once the buffers have been sized for the device
//! callback length, except when callbacks are queued for the first time.

use crate::audio::{converter_for, Buffer, ConverterFn, DeviceSpec, Sample};
use crate::error::{Error, Result};
use crate::playback::fade::FadeEvent;
use crate::playback::stream::{Stream, StreamCallback, StreamShared};
use audiomix_common::{Clock, FadeCurve, SystemClock};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, info};

/// Loop/finish callbacks collected during a pass
pub(crate) struct Notification<S: Sample> {
    stream: Arc<StreamShared<S>>,
    loops: u32,
    finished: bool,
    loop_callback: Option<StreamCallback<S>>,
    finish_callback: Option<StreamCallback<S>>,
}

/// State guarded by the device lock
pub(crate) struct MixState<S: Sample> {
    mix: Buffer<S>,
    strm: Buffer<S>,
    proc_buf: Buffer<S>,
    snapshot: Vec<Arc<StreamShared<S>>>,
    notifications: Vec<Notification<S>>,
}

impl<S: Sample> MixState<S> {
    fn new(len: usize) -> Self {
        Self {
            mix: Buffer::new(len),
            strm: Buffer::new(len),
            proc_buf: Buffer::new(len),
            snapshot: Vec::with_capacity(16),
            notifications: Vec::new(),
        }
    }
}

struct MixerShared<S: Sample> {
    spec: DeviceSpec,
    clock: Arc<dyn Clock>,
    fade_curve: FadeCurve,
    converter: ConverterFn<S>,
    device: Mutex<MixState<S>>,
    registry: Mutex<Vec<Arc<StreamShared<S>>>>,
}

/// Mixes every playing [`Stream`] into one device buffer.
///
/// Cloning is cheap and shares the same registry.
pub struct Mixer<S: Sample = f32> {
    shared: Arc<MixerShared<S>>,
}

impl<S: Sample> Clone for Mixer<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: Sample> Mixer<S> {
    /// Create a mixer for `spec` using wall-clock time and the default fade curve.
    pub fn new(spec: DeviceSpec) -> Result<Self> {
        Self::with_options(spec, Arc::new(SystemClock::new()), FadeCurve::default())
    }

    /// Create a mixer with an explicit tick source and fade curve.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedFormat`] for anything other than mono or
    /// stereo, or a zero rate or frame size.
    pub fn with_options(spec: DeviceSpec, clock: Arc<dyn Clock>, fade_curve: FadeCurve) -> Result<Self> {
        if !(1..=2).contains(&spec.channels) {
            return Err(Error::UnsupportedFormat(format!(
                "Only mono and stereo output is supported, got {} channels",
                spec.channels
            )));
        }
        if spec.rate == 0 || spec.frame_size == 0 {
            return Err(Error::UnsupportedFormat(format!(
                "Invalid output spec: {} Hz, frame size {}",
                spec.rate, spec.frame_size
            )));
        }

        let converter = converter_for::<S>(spec.format);
        let initial_len = spec.frame_size as usize * spec.channels as usize;

        info!(
            "Mixer ready: {} Hz, {} ch, {} frames, {} ({} fades)",
            spec.rate, spec.channels, spec.frame_size, spec.format, fade_curve
        );

        Ok(Self {
            shared: Arc::new(MixerShared {
                spec,
                clock,
                fade_curve,
                converter,
                device: Mutex::new(MixState::new(initial_len)),
                registry: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn spec(&self) -> DeviceSpec {
        self.shared.spec
    }

    pub fn fade_curve(&self) -> FadeCurve {
        self.shared.fade_curve
    }

    /// Current tick of the mixer clock
    pub fn now_ms(&self) -> i64 {
        self.shared.clock.now_ms()
    }

    /// Number of registered (playing) streams
    pub fn active_streams(&self) -> usize {
        self.shared.registry.lock().len()
    }

    /// Mix one pass into `out` without format conversion.
    ///
    /// A trailing partial frame is filled with silence.
    pub fn mix(&self, out: &mut [S]) {
        let channels = self.shared.spec.channels as usize;
        let wanted = out.len() / channels * channels;

        let notifications = {
            let mut device = self.shared.device.lock();
            self.mix_locked(&mut device, wanted);
            out[..wanted].copy_from_slice(&device.mix[..wanted]);
            take_notifications(&mut device)
        };
        out[wanted..].fill(S::SILENCE);

        self.dispatch(notifications);
    }

    /// Mix one pass and write it to `out` in the device sample format.
    ///
    /// This is the device callback body.
    pub fn mix_into(&self, out: &mut [u8]) {
        let bytes = self.shared.spec.format.bytes_per_sample();
        let channels = self.shared.spec.channels as usize;
        let wanted = out.len() / bytes / channels * channels;
        let converted = wanted * bytes;

        let notifications = {
            let mut device = self.shared.device.lock();
            self.mix_locked(&mut device, wanted);
            (self.shared.converter)(&mut out[..converted], &device.mix[..wanted]);
            take_notifications(&mut device)
        };

        if converted < out.len() {
            let mut silence = [0u8; 4];
            (self.shared.converter)(&mut silence[..bytes], &[S::SILENCE]);
            for chunk in out[converted..].chunks_mut(bytes) {
                let len = chunk.len();
                chunk.copy_from_slice(&silence[..len]);
            }
        }

        self.dispatch(notifications);
    }

    /// Stop every registered stream.
    pub fn stop_all(&self) {
        let _device = self.shared.device.lock();
        let streams = std::mem::take(&mut *self.shared.registry.lock());
        for stream in &streams {
            stream.state.lock().halt();
        }
        if !streams.is_empty() {
            info!("Stopped {} streams", streams.len());
        }
    }

    pub(crate) fn lock_device(&self) -> MutexGuard<'_, MixState<S>> {
        self.shared.device.lock()
    }

    pub(crate) fn register(&self, stream: &Arc<StreamShared<S>>) {
        let mut registry = self.shared.registry.lock();
        if !registry.iter().any(|s| Arc::ptr_eq(s, stream)) {
            registry.push(Arc::clone(stream));
        }
    }

    pub(crate) fn deregister(&self, stream: &Arc<StreamShared<S>>) {
        self.shared
            .registry
            .lock()
            .retain(|s| !Arc::ptr_eq(s, stream));
    }

    pub(crate) fn is_registered(&self, stream: &Arc<StreamShared<S>>) -> bool {
        self.shared
            .registry
            .lock()
            .iter()
            .any(|s| Arc::ptr_eq(s, stream))
    }

    fn mix_locked(&self, device: &mut MixState<S>, wanted: usize) {
        let shared = &*self.shared;
        let MixState {
            mix,
            strm,
            proc_buf,
            snapshot,
            notifications,
        } = device;

        if mix.len() != wanted {
            debug!("Mix buffers resized to {} samples", wanted);
            mix.reset(wanted);
            strm.reset(wanted);
            proc_buf.reset(wanted);
        }
        mix.fill_silence();

        snapshot.clear();
        snapshot.extend(shared.registry.lock().iter().cloned());
        if snapshot.is_empty() {
            return;
        }

        let channels = shared.spec.channels as usize;
        let rate = shared.spec.rate as i64;
        let now = shared.clock.now_ms();
        let buffer_ms = (wanted / channels) as i64 * 1000 / rate;

        for stream in snapshot.iter() {
            let mut state = stream.state.lock();
            if !state.is_mixable() {
                continue;
            }

            let elapsed = now - state.playback_start_tick;
            if elapsed <= 0 {
                continue;
            }

            // Started part way into this buffer: keep the lead-in silent
            let mut offset = 0;
            if elapsed < buffer_ms {
                let offset_ms = buffer_ms - elapsed;
                let samples = (offset_ms * channels as i64 * rate / 1000) as usize;
                offset = (samples - samples % channels).min(wanted);
            }

            let fill = state.fill(&mut strm[..wanted], offset);
            if fill.finished {
                self.deregister(stream);
            }
            state.run_processors(&mut strm[offset..fill.end], &mut proc_buf[offset..fill.end]);

            match state.fader.process(now, shared.fade_curve) {
                FadeEvent::Stop => {
                    self.deregister(stream);
                    state.halt();
                }
                FadeEvent::Pause => state.is_paused = true,
                FadeEvent::None => {}
            }

            let (left, right) = state.channel_gains(channels);
            if !state.is_muted && (left > 0.0 || right > 0.0) {
                mix_span(
                    &mut mix[offset..fill.end],
                    &strm[offset..fill.end],
                    channels,
                    left,
                    right,
                );
            }

            if fill.finished || fill.loops > 0 {
                notifications.push(Notification {
                    stream: Arc::clone(stream),
                    loops: fill.loops,
                    finished: fill.finished,
                    loop_callback: state.loop_callback.clone(),
                    finish_callback: state.finish_callback.clone(),
                });
            }
        }

        // Never keep streams alive past the pass
        snapshot.clear();
    }

    fn dispatch(&self, mut notifications: Vec<Notification<S>>) {
        if notifications.is_empty() {
            return;
        }

        for notification in notifications.drain(..) {
            let stream = Stream::handle(self.clone(), notification.stream);
            if let Some(callback) = &notification.loop_callback {
                for _ in 0..notification.loops {
                    callback(&stream);
                }
            }
            if notification.finished {
                if let Some(callback) = &notification.finish_callback {
                    callback(&stream);
                }
            }
        }

        // Hand the allocation back for the next pass
        let mut device = self.shared.device.lock();
        if device.notifications.capacity() == 0 {
            device.notifications = notifications;
        }
    }
}

fn take_notifications<S: Sample>(device: &mut MixState<S>) -> Vec<Notification<S>> {
    if device.notifications.is_empty() {
        Vec::new()
    } else {
        std::mem::take(&mut device.notifications)
    }
}

/// Add `src` into `mix` with per-channel gains, skipping the multiply at unity.
fn mix_span<S: Sample>(mix: &mut [S], src: &[S], channels: usize, left: f32, right: f32) {
    if channels > 1 && (left != 1.0 || right != 1.0) {
        for (out, frame) in mix.chunks_mut(2).zip(src.chunks(2)) {
            out[0] = out[0].mix(frame[0].amplify(left));
            if let (Some(out_r), Some(&in_r)) = (out.get_mut(1), frame.get(1)) {
                *out_r = out_r.mix(in_r.amplify(right));
            }
        }
    } else if left != 1.0 {
        for (out, &sample) in mix.iter_mut().zip(src) {
            *out = out.mix(sample.amplify(left));
        }
    } else {
        for (out, &sample) in mix.iter_mut().zip(src) {
            *out = out.mix(sample);
        }
    }
}
