//! Symphonia decoding and end-to-end playback of generated WAV files

mod helpers;

use audiomix_engine::audio::{decoder_for, Decoder};
use audiomix_engine::config::ResamplerKind;
use audiomix_engine::{AudioSystem, Source};
use helpers::*;
use std::io::Seek;
use std::time::Duration;
use tempfile::TempDir;

/// Decode everything left, in chunks of `chunk` samples
fn decode_all(decoder: &mut dyn Decoder<f32>, chunk: usize) -> Vec<f32> {
    let mut out = Vec::new();
    let mut buf = vec![0.0f32; chunk];
    loop {
        let decoded = decoder.decode(&mut buf);
        out.extend_from_slice(&buf[..decoded.produced]);
        if decoded.produced == 0 && !decoded.call_again {
            break;
        }
    }
    out
}

#[test]
fn test_decode_mono_wav() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    write_constant_wav(&path, 8000, 1, 800, 0.5).unwrap();

    let source = Source::from_file(&path).unwrap();
    let mut decoder = decoder_for::<f32>(&source).expect("wav is recognised");
    assert!(decoder.is_open());
    assert_eq!(decoder.channels(), 1);
    assert_eq!(decoder.rate(), 8000);
    assert_eq!(decoder.duration(), Duration::from_millis(100));

    let samples = decode_all(decoder.as_mut(), 333);
    assert_eq!(samples.len(), 800);
    assert!(samples.iter().all(|&s| s == 0.5));

    // Keeps reporting end of stream
    let mut buf = [0.0f32; 16];
    assert_eq!(decoder.decode(&mut buf).produced, 0);
}

#[test]
fn test_decode_stereo_wav_whole_frames() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stereo.wav");
    write_constant_wav(&path, 44100, 2, 1000, -0.25).unwrap();

    let source = Source::from_file(&path).unwrap();
    let mut decoder = decoder_for::<f32>(&source).unwrap();
    assert_eq!(decoder.channels(), 2);

    // An odd buffer never splits a frame
    let mut buf = [0.0f32; 7];
    assert_eq!(decoder.decode(&mut buf).produced, 6);

    let rest = decode_all(decoder.as_mut(), 101);
    assert_eq!(rest.len(), 1994);
    assert!(rest.iter().all(|&s| s == -0.25));
}

#[test]
fn test_rewind_and_seek() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("seek.wav");
    write_constant_wav(&path, 8000, 1, 800, 0.5).unwrap();

    let source = Source::from_file(&path).unwrap();
    let mut decoder = decoder_for::<f32>(&source).unwrap();

    assert_eq!(decode_all(decoder.as_mut(), 256).len(), 800);
    decoder.rewind().unwrap();
    assert_eq!(decode_all(decoder.as_mut(), 256).len(), 800);

    decoder.seek_to_time(Duration::from_millis(50)).unwrap();
    let rest = decode_all(decoder.as_mut(), 256).len();
    assert!((395..=405).contains(&rest), "got {}", rest);
}

#[test]
fn test_decode_to_int32() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("int.wav");
    write_constant_wav(&path, 8000, 1, 100, 0.5).unwrap();

    let source = Source::from_file(&path).unwrap();
    let mut decoder = decoder_for::<i32>(&source).unwrap();
    let mut buf = [0i32; 100];
    assert_eq!(decoder.decode(&mut buf).produced, 100);
    assert!(buf.iter().all(|&s| s == 1 << 30));
}

#[test]
fn test_unrecognised_data_restores_position() {
    let source = Source::from_bytes(b"definitely not audio data".repeat(10));
    assert!(decoder_for::<f32>(&source).is_none());

    let mut cursor = source.clone();
    assert_eq!(cursor.stream_position().unwrap(), 0);
}

#[test]
fn test_play_wav_through_system() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("play.wav");
    // 100 ms at 8 kHz, played on a 1 kHz stereo mixer
    write_constant_wav(&path, 8000, 1, 800, 0.5).unwrap();

    let (mixer, clock) = test_mixer::<f32>(2);
    let system = AudioSystem::with_mixer(mixer.clone(), ResamplerKind::Linear);
    let stream = system.open_file(&path).unwrap();
    stream.play(1, Duration::ZERO).unwrap();
    clock.set(PASS_MS);

    let mut played = Vec::new();
    for _ in 0..100 {
        if !stream.is_playing() {
            break;
        }
        played.extend(mix_pass(&mixer));
    }

    assert!(!stream.is_playing());
    assert_eq!(mixer.active_streams(), 0);
    let audible: Vec<f32> = played.into_iter().filter(|&s| s != 0.0).collect();
    // About 100 frames of stereo output
    assert!(audible.len() >= 180 && audible.len() <= 200, "got {}", audible.len());
    assert!(audible.iter().all(|&s| s == 0.5));
}
