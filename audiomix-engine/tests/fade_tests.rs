//! Fade envelope tests
//!
//! The test streams produce a constant 1.0, so every mixed sample equals the
//! fade gain for that pass.

mod helpers;

use audiomix_common::FadeCurve;
use audiomix_engine::SampleFormat;
use helpers::*;
use std::time::Duration;

const FADE: Duration = Duration::from_millis(100);

#[test]
fn test_fade_in_follows_cubic_curve() {
    let (mixer, clock) = test_mixer::<f32>(1);
    let stream = const_stream(&mixer, 1.0, 1, 10_000);
    stream.play(0, FADE).unwrap();

    clock.set(50);
    assert_all_close(&mix_pass(&mixer), 0.125);

    clock.set(100);
    assert_all_close(&mix_pass(&mixer), 1.0);

    clock.set(500);
    assert_all_close(&mix_pass(&mixer), 1.0);
}

#[test]
fn test_fade_in_linear_curve() {
    let (mixer, clock) = test_mixer_with::<f32>(1, SampleFormat::F32, FadeCurve::Linear);
    let stream = const_stream(&mixer, 1.0, 1, 10_000);
    stream.play(0, FADE).unwrap();

    clock.set(25);
    assert_all_close(&mix_pass(&mixer), 0.25);
}

#[test]
fn test_stop_with_fade_out() {
    let (mixer, clock) = test_mixer::<f32>(1);
    let stream = const_stream(&mixer, 1.0, 1, 10_000);
    stream.play(0, Duration::ZERO).unwrap();
    clock.set(100);
    assert_all_close(&mix_pass(&mixer), 1.0);

    stream.stop(FADE);
    assert!(stream.is_playing());

    clock.set(150);
    assert_all_close(&mix_pass(&mixer), 0.125);
    assert!(stream.is_playing());

    clock.set(200);
    assert_all_close(&mix_pass(&mixer), 0.0);
    assert!(!stream.is_playing());
    assert_eq!(mixer.active_streams(), 0);
}

#[test]
fn test_pause_with_fade_out_then_resume() {
    let (mixer, clock) = test_mixer::<f32>(1);
    let stream = const_stream(&mixer, 1.0, 1, 10_000);
    stream.play(0, Duration::ZERO).unwrap();
    clock.set(100);
    mix_pass(&mixer);

    stream.pause(FADE);
    assert!(!stream.is_paused());

    clock.set(200);
    assert_all_close(&mix_pass(&mixer), 0.0);
    assert!(stream.is_paused());
    assert!(stream.is_playing());

    clock.set(300);
    assert_all_close(&mix_pass(&mixer), 0.0);

    stream.resume(FADE);
    clock.set(350);
    assert_all_close(&mix_pass(&mixer), 0.125);
}

#[test]
fn test_play_after_fade_stop_is_full_volume() {
    let (mixer, clock) = test_mixer::<f32>(1);
    let stream = const_stream(&mixer, 1.0, 1, 10_000);
    stream.play(0, Duration::ZERO).unwrap();
    clock.set(100);
    mix_pass(&mixer);

    stream.stop(FADE);
    clock.set(200);
    mix_pass(&mixer);
    assert!(!stream.is_playing());

    stream.play(0, Duration::ZERO).unwrap();
    clock.set(300);
    assert_all_close(&mix_pass(&mixer), 1.0);
}

#[test]
fn test_fade_applies_to_volume_and_pan() {
    let (mixer, clock) = test_mixer::<f32>(2);
    let stream = const_stream(&mixer, 1.0, 2, 10_000);
    stream.set_volume(0.5);
    stream.set_stereo_position(0.5);
    stream.play(0, FADE).unwrap();

    clock.set(50);
    let out = mix_pass(&mixer);
    for frame in out.chunks(2) {
        assert!((frame[0] - 0.03125).abs() < 1e-6);
        assert!((frame[1] - 0.0625).abs() < 1e-6);
    }
}
