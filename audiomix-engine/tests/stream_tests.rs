//! Stream state machine tests
//!
//! Open/play/pause/resume/stop transitions, registry membership, parameter
//! clamping, processors and ownership of the input source.

mod helpers;

use audiomix_engine::error::Error;
use audiomix_engine::playback::{PlaybackState, Processor, SharedProcessor};
use audiomix_engine::{Source, Stream};
use helpers::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

struct Gain(f32);

impl Processor<f32> for Gain {
    fn process(&mut self, dst: &mut [f32], src: &[f32]) {
        for (out, &sample) in dst.iter_mut().zip(src) {
            *out = sample * self.0;
        }
    }
}

#[test]
fn test_new_stream_is_closed() {
    let (mixer, _clock) = test_mixer::<f32>(2);
    let stream = const_stream(&mixer, 0.5, 2, 1000);

    assert_eq!(stream.state(), PlaybackState::Closed);
    assert!(!stream.is_open());
    assert!(!stream.is_playing());
    assert_eq!(mixer.active_streams(), 0);
}

#[test]
fn test_open_is_idempotent() {
    let (mixer, _clock) = test_mixer::<f32>(2);
    let stream = const_stream(&mixer, 0.5, 2, 1000);

    stream.open().unwrap();
    stream.open().unwrap();
    assert!(stream.is_open());
    assert_eq!(stream.state(), PlaybackState::Stopped);
    assert_eq!(stream.duration(), Duration::from_secs(1));
}

#[test]
fn test_play_registers_and_stop_deregisters() {
    let (mixer, _clock) = test_mixer::<f32>(2);
    let stream = const_stream(&mixer, 0.5, 2, 1000);

    stream.play(1, Duration::ZERO).unwrap();
    assert!(stream.is_open());
    assert!(stream.is_playing());
    assert!(stream.is_registered());
    assert_eq!(stream.state(), PlaybackState::Playing);
    assert_eq!(mixer.active_streams(), 1);

    stream.stop(Duration::ZERO);
    assert!(!stream.is_playing());
    assert!(!stream.is_registered());
    assert_eq!(stream.state(), PlaybackState::Stopped);
    assert_eq!(mixer.active_streams(), 0);
}

#[test]
fn test_play_while_playing_is_noop() {
    let (mixer, clock) = test_mixer::<f32>(1);
    let stream = const_stream(&mixer, 0.5, 1, 1000);

    stream.play(3, Duration::ZERO).unwrap();
    clock.set(PASS_MS);
    mix_pass(&mixer);

    stream.play(7, Duration::ZERO).unwrap();
    assert_eq!(stream.wanted_iterations(), 3);
    assert_eq!(mixer.active_streams(), 1);
}

#[test]
fn test_pause_and_resume() {
    let (mixer, clock) = test_mixer::<f32>(2);
    let stream = const_stream(&mixer, 0.5, 2, 1000);
    stream.play(1, Duration::ZERO).unwrap();
    clock.set(PASS_MS);

    stream.pause(Duration::ZERO);
    assert!(stream.is_paused());
    assert!(stream.is_playing());
    assert_eq!(stream.state(), PlaybackState::Paused);
    assert_all_close(&mix_pass(&mixer), 0.0);

    stream.resume(Duration::ZERO);
    assert!(!stream.is_paused());
    assert_all_close(&mix_pass(&mixer), 0.5);
}

#[test]
fn test_pause_and_resume_ignored_when_not_applicable() {
    let (mixer, _clock) = test_mixer::<f32>(2);
    let stream = const_stream(&mixer, 0.5, 2, 1000);

    stream.pause(Duration::ZERO);
    assert!(!stream.is_paused());

    stream.play(1, Duration::ZERO).unwrap();
    stream.resume(Duration::ZERO);
    assert!(!stream.is_paused());
    assert!(stream.is_playing());
}

#[test]
fn test_stop_clears_pause() {
    let (mixer, _clock) = test_mixer::<f32>(2);
    let stream = const_stream(&mixer, 0.5, 2, 1000);
    stream.play(1, Duration::ZERO).unwrap();
    stream.pause(Duration::ZERO);

    // A paused stream is not mixed, so a fade could never complete
    stream.stop(Duration::from_millis(100));
    assert!(!stream.is_playing());
    assert!(!stream.is_paused());
    assert_eq!(mixer.active_streams(), 0);
}

#[test]
fn test_replay_after_stop_starts_from_beginning() {
    let (mixer, clock) = test_mixer::<f32>(1);
    // 15 frames: one full pass plus 5 frames
    let stream = const_stream(&mixer, 0.5, 1, 15);
    stream.play(1, Duration::ZERO).unwrap();
    clock.set(PASS_MS);
    mix_pass(&mixer);

    stream.stop(Duration::ZERO);
    stream.play(1, Duration::ZERO).unwrap();
    clock.set(2 * PASS_MS);
    assert_all_close(&mix_pass(&mixer), 0.5);
}

#[test]
fn test_missing_file_fails_to_open() {
    let (mixer, _clock) = test_mixer::<f32>(2);
    let stream = Stream::from_file(
        &mixer,
        "/nonexistent/audiomix/missing.wav",
        Box::new(ConstDecoder::new(0.5f32, 2, TEST_RATE, 100)),
        None,
    );

    assert!(matches!(stream.open(), Err(Error::Open(_))));
    assert!(matches!(stream.play(1, Duration::ZERO), Err(Error::Open(_))));
    assert!(!stream.is_playing());
    assert_eq!(mixer.active_streams(), 0);
}

#[test]
fn test_seek_requires_open_stream() {
    let (mixer, _clock) = test_mixer::<f32>(2);
    let stream = const_stream(&mixer, 0.5, 2, 1000);

    assert!(matches!(
        stream.seek_to_time(Duration::from_millis(10)),
        Err(Error::InvalidState(_))
    ));
    stream.open().unwrap();
    stream.seek_to_time(Duration::from_millis(10)).unwrap();
}

#[test]
fn test_seek_skips_audio() {
    let (mixer, clock) = test_mixer::<f32>(1);
    let stream = const_stream(&mixer, 0.5, 1, 100);
    stream.open().unwrap();
    stream.seek_to_time(Duration::from_millis(95)).unwrap();

    stream.play(1, Duration::ZERO).unwrap();
    clock.set(PASS_MS);
    let out = mix_pass(&mixer);

    // Only 5 frames were left after the seek
    assert_all_close(&out[..5], 0.5);
    assert_all_close(&out[5..], 0.0);
    assert!(!stream.is_playing());
}

#[test]
fn test_rewind_opens_stream() {
    let (mixer, _clock) = test_mixer::<f32>(2);
    let stream = const_stream(&mixer, 0.5, 2, 1000);
    stream.rewind().unwrap();
    assert!(stream.is_open());
}

#[test]
fn test_volume_and_pan_are_clamped() {
    let (mixer, _clock) = test_mixer::<f32>(2);
    let stream = const_stream(&mixer, 0.5, 2, 1000);

    assert_eq!(stream.volume(), 1.0);
    stream.set_volume(-2.0);
    assert_eq!(stream.volume(), 0.0);
    stream.set_volume(3.5);
    assert_eq!(stream.volume(), 3.5);

    stream.set_stereo_position(-4.0);
    assert_eq!(stream.stereo_position(), -1.0);
    stream.set_stereo_position(2.0);
    assert_eq!(stream.stereo_position(), 1.0);
    stream.set_stereo_position(f32::NAN);
    assert_eq!(stream.stereo_position(), 0.0);
}

#[test]
fn test_mute_silences_stream() {
    let (mixer, clock) = test_mixer::<f32>(2);
    let stream = const_stream(&mixer, 0.5, 2, 1000);
    stream.play(1, Duration::ZERO).unwrap();
    clock.set(PASS_MS);

    stream.mute();
    assert!(stream.is_muted());
    assert_all_close(&mix_pass(&mixer), 0.0);

    stream.unmute();
    assert!(!stream.is_muted());
    assert_all_close(&mix_pass(&mixer), 0.5);
}

#[test]
fn test_processors_run_in_order_and_dedupe() {
    let (mixer, clock) = test_mixer::<f32>(2);
    let stream = const_stream(&mixer, 0.25, 2, 1000);
    let double: SharedProcessor<f32> = Arc::new(Mutex::new(Gain(2.0)));
    let half: SharedProcessor<f32> = Arc::new(Mutex::new(Gain(0.5)));

    stream.add_processor(double.clone());
    stream.add_processor(double.clone());
    stream.play(0, Duration::ZERO).unwrap();
    clock.set(PASS_MS);
    assert_all_close(&mix_pass(&mixer), 0.5);

    stream.add_processor(half.clone());
    assert_all_close(&mix_pass(&mixer), 0.25);

    assert!(stream.remove_processor(&half));
    assert!(!stream.remove_processor(&half));
    assert_all_close(&mix_pass(&mixer), 0.5);

    stream.clear_processors();
    assert_all_close(&mix_pass(&mixer), 0.25);
}

#[test]
fn test_drop_deregisters_stream() {
    let (mixer, clock) = test_mixer::<f32>(2);
    let stream = const_stream(&mixer, 0.5, 2, 1000);
    stream.play(0, Duration::ZERO).unwrap();
    assert_eq!(mixer.active_streams(), 1);

    drop(stream);
    assert_eq!(mixer.active_streams(), 0);
    clock.set(PASS_MS);
    assert_all_close(&mix_pass(&mixer), 0.0);
}

#[test]
fn test_owned_source_closed_on_drop() {
    let (mixer, _clock) = test_mixer::<f32>(2);

    let owned = Source::from_bytes(vec![1, 2, 3]);
    let stream = Stream::new(
        &mixer,
        owned.clone(),
        Box::new(ConstDecoder::new(0.5f32, 2, TEST_RATE, 10)),
        None,
        true,
    );
    drop(stream);
    assert!(owned.is_closed());

    let borrowed = Source::from_bytes(vec![1, 2, 3]);
    let stream = Stream::new(
        &mixer,
        borrowed.clone(),
        Box::new(ConstDecoder::new(0.5f32, 2, TEST_RATE, 10)),
        None,
        false,
    );
    drop(stream);
    assert!(!borrowed.is_closed());
}
