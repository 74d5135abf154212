//! Channel layout adaptation between decoders and the device
//!
//! Only mono and stereo are supported.

use crate::audio::Sample;

/// Expand mono to stereo in place.
///
/// The first `buf.len() / 2` samples are the mono input; on return the whole
/// buffer holds interleaved stereo with each input sample duplicated.
/// Works back to front so no input sample is overwritten before it is read.
pub fn mono_to_stereo<S: Sample>(buf: &mut [S]) {
    let frames = buf.len() / 2;
    for i in (0..frames).rev() {
        let sample = buf[i];
        buf[2 * i + 1] = sample;
        buf[2 * i] = sample;
    }
}

/// Average interleaved stereo `src` down to mono `dst`.
///
/// Processes `min(dst.len(), src.len() / 2)` frames and returns that count.
pub fn stereo_to_mono<S: Sample>(dst: &mut [S], src: &[S]) -> usize {
    let mut frames = 0;
    for (out, pair) in dst.iter_mut().zip(src.chunks_exact(2)) {
        *out = S::average(pair[0], pair[1]);
        frames += 1;
    }
    frames
}
