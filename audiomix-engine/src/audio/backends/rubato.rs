//! Resampler backend using rubato
//!
//! Wraps rubato's `FastFixedIn` (septic polynomial interpolation). rubato works
//! on planar f32 chunks of a fixed size, so input is staged until a full chunk
//! is available and converted output is held until the caller has room for it.

use crate::audio::{ResamplerBackend, Sample};
use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::{debug, warn};

/// Input frames per rubato processing call
pub const CHUNK_FRAMES: usize = 128;

/// rubato-backed resampler
pub struct RubatoBackend {
    resampler: Option<FastFixedIn<f32>>,
    channels: usize,
    /// Planar input staging, `CHUNK_FRAMES` per channel
    staging: Vec<Vec<f32>>,
    staged: usize,
    /// Planar converted output not yet handed out
    converted: Vec<Vec<f32>>,
    converted_pos: usize,
    converted_len: usize,
}

impl RubatoBackend {
    pub fn new() -> Self {
        Self {
            resampler: None,
            channels: 0,
            staging: Vec::new(),
            staged: 0,
            converted: Vec::new(),
            converted_pos: 0,
            converted_len: 0,
        }
    }
}

impl Default for RubatoBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Sample> ResamplerBackend<S> for RubatoBackend {
    fn adjust_for_output_spec(&mut self, dst_rate: u32, src_rate: u32, channels: u16) -> Result<()> {
        self.resampler = None;
        if dst_rate == 0 || src_rate == 0 || channels == 0 {
            return Err(Error::Resampler(format!(
                "Cannot resample {} Hz -> {} Hz with {} channels",
                src_rate, dst_rate, channels
            )));
        }

        let resampler = FastFixedIn::<f32>::new(
            dst_rate as f64 / src_rate as f64,
            1.0, // max_relative_ratio (no runtime changes)
            PolynomialDegree::Septic,
            CHUNK_FRAMES,
            channels as usize,
        )
        .map_err(|e| Error::Resampler(format!("Failed to create resampler: {}", e)))?;

        let channels = channels as usize;
        self.channels = channels;
        self.staging = vec![vec![0.0; CHUNK_FRAMES]; channels];
        self.staged = 0;
        self.converted = vec![vec![0.0; resampler.output_frames_max()]; channels];
        self.converted_pos = 0;
        self.converted_len = 0;
        self.resampler = Some(resampler);

        debug!(
            "rubato resampler ready: {} Hz -> {} Hz, {} ch",
            src_rate, dst_rate, channels
        );
        Ok(())
    }

    fn do_resampling(&mut self, dst: &mut [S], src: &[S]) -> (usize, usize) {
        let channels = self.channels;
        let Some(resampler) = self.resampler.as_mut() else {
            return (0, 0);
        };
        let src_frames = src.len() / channels;
        let dst_frames = dst.len() / channels;
        let mut read = 0;
        let mut written = 0;

        loop {
            // Hand out converted frames first
            while self.converted_pos < self.converted_len && written < dst_frames {
                for ch in 0..channels {
                    dst[written * channels + ch] = S::from_f32(self.converted[ch][self.converted_pos]);
                }
                self.converted_pos += 1;
                written += 1;
            }
            if self.converted_pos < self.converted_len {
                break;
            }

            // Stage input up to a full chunk
            while self.staged < CHUNK_FRAMES && read < src_frames {
                for ch in 0..channels {
                    self.staging[ch][self.staged] = src[read * channels + ch].to_f32();
                }
                self.staged += 1;
                read += 1;
            }
            if self.staged < CHUNK_FRAMES {
                break;
            }

            match resampler.process_into_buffer(&self.staging[..], &mut self.converted[..], None) {
                Ok((_, frames_out)) => {
                    self.converted_len = frames_out;
                    self.converted_pos = 0;
                    self.staged = 0;
                }
                Err(e) => {
                    warn!("rubato processing failed, dropping chunk: {}", e);
                    self.staged = 0;
                    break;
                }
            }
        }

        (written * channels, read * channels)
    }

    fn discard_pending_samples(&mut self) {
        self.staged = 0;
        self.converted_pos = 0;
        self.converted_len = 0;
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }
}
