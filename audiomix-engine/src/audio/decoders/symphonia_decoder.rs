//! Streaming decoder using symphonia
//!
//! Decodes WAV, FLAC, Vorbis, MP3, AAC and MP4 audio packet by packet into a
//! small pending buffer, handing out as many samples per call as fit.
//! Packets whose channel count or rate differ from the current spec are
//! reported through `call_again`.

use crate::audio::{Decoded, Decoder, Sample, Source};
use crate::error::{Error, Result};
use std::io;
use std::marker::PhantomData;
use std::path::Path;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder as CodecDecoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;
use tracing::{debug, warn};

impl MediaSource for Source {
    fn is_seekable(&self) -> bool {
        !self.is_closed()
    }

    fn byte_len(&self) -> Option<u64> {
        Source::byte_len(self)
    }
}

struct OpenTrack {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn CodecDecoder>,
    track_id: u32,
    track_rate: u32,
    n_frames: Option<u64>,
}

/// Reusable conversion buffer, reallocated only when a packet outgrows it
struct ScratchBuffer {
    buf: SampleBuffer<f32>,
    frames: u64,
    channels: usize,
}

/// Symphonia-backed [`Decoder`].
pub struct SymphoniaDecoder<S: Sample> {
    track: Option<OpenTrack>,
    channels: u16,
    rate: u32,
    pending: Vec<f32>,
    pending_pos: usize,
    scratch: Option<ScratchBuffer>,
    /// Frames still to drop after an accurate seek
    skip_frames: u64,
    eof: bool,
    _sample: PhantomData<S>,
}

impl<S: Sample> SymphoniaDecoder<S> {
    pub fn new() -> Self {
        Self {
            track: None,
            channels: 0,
            rate: 0,
            pending: Vec::new(),
            pending_pos: 0,
            scratch: None,
            skip_frames: 0,
            eof: false,
            _sample: PhantomData,
        }
    }

    /// Decode the next packet of our track into `pending`.
    ///
    /// Returns the packet's (channels, rate), or `None` at end of stream or on
    /// an unrecoverable error.
    fn next_packet(&mut self) -> Option<(u16, u32)> {
        let track = self.track.as_mut()?;

        loop {
            let packet = match track.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return None;
                }
                Err(SymphoniaError::ResetRequired) => {
                    track.decoder.reset();
                    continue;
                }
                Err(e) => {
                    warn!("Stopping decode after read error: {}", e);
                    return None;
                }
            };

            if packet.track_id() != track.track_id {
                continue;
            }

            let decoded = match track.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!("Skipping corrupt packet: {}", e);
                    continue;
                }
                Err(SymphoniaError::ResetRequired) => {
                    track.decoder.reset();
                    continue;
                }
                Err(e) => {
                    warn!("Stopping decode after decoder error: {}", e);
                    return None;
                }
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count();
            let frames = decoded.capacity() as u64;

            let reuse = matches!(
                &self.scratch,
                Some(s) if s.frames >= frames && s.channels == channels
            );
            if !reuse {
                self.scratch = Some(ScratchBuffer {
                    buf: SampleBuffer::<f32>::new(frames, spec),
                    frames,
                    channels,
                });
            }
            let scratch = self.scratch.as_mut()?;
            scratch.buf.copy_interleaved_ref(decoded);

            let samples = scratch.buf.samples();
            let decoded_frames = samples.len() / channels.max(1);
            let skip = self.skip_frames.min(decoded_frames as u64);
            self.skip_frames -= skip;

            self.pending.clear();
            self.pending.extend_from_slice(samples);
            self.pending_pos = skip as usize * channels;

            return Some((channels as u16, spec.rate));
        }
    }
}

impl<S: Sample> Default for SymphoniaDecoder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Sample> Decoder<S> for SymphoniaDecoder<S> {
    fn open(&mut self, source: Source) -> Result<()> {
        let name = source.name().to_string();
        let mss = MediaSourceStream::new(Box::new(source), Default::default());

        // Hint the format registry with the file extension, if any
        let mut hint = Hint::new();
        if let Some(ext) = Path::new(&name).extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Open(format!("Unrecognised format in {}: {}", name, e)))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Open(format!("No audio track in {}", name)))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| Error::Open(format!("Unsupported codec in {}: {}", name, e)))?;

        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);
        let rate = params.sample_rate.unwrap_or(0);
        if channels == 0 || rate == 0 {
            return Err(Error::Open(format!(
                "{} does not declare its channel layout and sample rate",
                name
            )));
        }

        debug!(
            "Opened {}: {} Hz, {} ch, {:?} frames",
            name, rate, channels, params.n_frames
        );

        self.track = Some(OpenTrack {
            format,
            decoder,
            track_id,
            track_rate: rate,
            n_frames: params.n_frames,
        });
        self.channels = channels;
        self.rate = rate;
        self.pending.clear();
        self.pending_pos = 0;
        self.skip_frames = 0;
        self.eof = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.track.is_some()
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn rate(&self) -> u32 {
        self.rate
    }

    fn decode(&mut self, buf: &mut [S]) -> Decoded {
        if self.track.is_none() {
            return Decoded::end_of_stream();
        }

        let channels = self.channels.max(1) as usize;
        let mut produced = 0;

        loop {
            let available = self.pending.len() - self.pending_pos;
            if available > 0 {
                // Whole frames only
                let space = (buf.len() - produced) / channels * channels;
                let count = available.min(space);
                if count == 0 {
                    break;
                }
                let pending = &self.pending[self.pending_pos..self.pending_pos + count];
                for (out, &sample) in buf[produced..produced + count].iter_mut().zip(pending) {
                    *out = S::from_f32(sample);
                }
                produced += count;
                self.pending_pos += count;
                if self.pending_pos < self.pending.len() {
                    break;
                }
            }

            if self.eof || produced >= buf.len() {
                break;
            }

            match self.next_packet() {
                Some((packet_channels, packet_rate)) => {
                    if packet_channels != self.channels || packet_rate != self.rate {
                        debug!(
                            "Stream spec changed: {} Hz {} ch -> {} Hz {} ch",
                            self.rate, self.channels, packet_rate, packet_channels
                        );
                        self.channels = packet_channels;
                        self.rate = packet_rate;
                        return Decoded {
                            produced,
                            call_again: true,
                        };
                    }
                }
                None => {
                    self.eof = true;
                    break;
                }
            }
        }

        Decoded::samples(produced)
    }

    fn rewind(&mut self) -> Result<()> {
        self.seek_to_time(Duration::ZERO)
    }

    fn duration(&self) -> Duration {
        match &self.track {
            Some(track) if track.track_rate > 0 => track
                .n_frames
                .map(|n| Duration::from_secs_f64(n as f64 / track.track_rate as f64))
                .unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }

    fn seek_to_time(&mut self, pos: Duration) -> Result<()> {
        let track = self
            .track
            .as_mut()
            .ok_or_else(|| Error::InvalidState("Decoder is not open".to_string()))?;

        let seeked = track
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: Time::new(pos.as_secs(), pos.subsec_nanos() as f64 / 1e9),
                    track_id: Some(track.track_id),
                },
            )
            .map_err(|e| Error::Decode(format!("Seek to {:?} failed: {}", pos, e)))?;
        track.decoder.reset();

        self.skip_frames = seeked.required_ts.saturating_sub(seeked.actual_ts);
        self.pending.clear();
        self.pending_pos = 0;
        self.eof = false;
        Ok(())
    }
}
