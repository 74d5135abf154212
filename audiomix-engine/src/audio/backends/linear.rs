//! Linear interpolation resampler backend
//!
//! Cheap and fully deterministic. Output frame `k` is taken at input position
//! `k * src / dst`, interpolated between the two surrounding frames. The frame
//! under the read position is never consumed, so it is still available as the
//! left neighbour on the next call.

use crate::audio::{ResamplerBackend, Sample};
use crate::error::{Error, Result};

/// Linear interpolation backend
#[derive(Debug, Default)]
pub struct LinearBackend {
    channels: usize,
    /// Input frames advanced per output frame
    step: f64,
    /// Read position in frames, relative to the start of the current input
    pos: f64,
}

impl LinearBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: Sample> ResamplerBackend<S> for LinearBackend {
    fn adjust_for_output_spec(&mut self, dst_rate: u32, src_rate: u32, channels: u16) -> Result<()> {
        if dst_rate == 0 || src_rate == 0 || channels == 0 {
            return Err(Error::Resampler(format!(
                "Linear backend cannot convert {} Hz -> {} Hz with {} channels",
                src_rate, dst_rate, channels
            )));
        }
        self.channels = channels as usize;
        self.step = src_rate as f64 / dst_rate as f64;
        self.pos = 0.0;
        Ok(())
    }

    fn do_resampling(&mut self, dst: &mut [S], src: &[S]) -> (usize, usize) {
        let channels = self.channels;
        if channels == 0 {
            return (0, 0);
        }
        let src_frames = src.len() / channels;
        let dst_frames = dst.len() / channels;

        let mut written = 0;
        while written < dst_frames {
            let index = self.pos.floor() as usize;
            if index + 1 >= src_frames {
                break;
            }
            let frac = self.pos - index as f64;
            let left = &src[index * channels..(index + 1) * channels];
            let right = &src[(index + 1) * channels..(index + 2) * channels];
            let out = &mut dst[written * channels..(written + 1) * channels];
            for ch in 0..channels {
                out[ch] = S::lerp(left[ch], right[ch], frac);
            }
            written += 1;
            self.pos += self.step;
        }

        let consumed = (self.pos.floor() as usize).min(src_frames);
        self.pos -= consumed as f64;
        (written * channels, consumed * channels)
    }

    fn discard_pending_samples(&mut self) {
        self.pos = 0.0;
    }
}
