//! Audio output using cpal
//!
//! Opens an output device, negotiates a [`DeviceSpec`] close to the requested
//! one and drives a [`Mixer`] from the device callback. The callback writes raw
//! bytes, so every format the mixer can convert to is usable without a
//! per-format stream builder.

use crate::audio::{Sample, SampleFormat};
use crate::error::{Error, Result};
use crate::playback::Mixer;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, StreamConfig, SupportedBufferSize, SupportedStreamConfigRange};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Output format the mixer renders to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSpec {
    /// Frames per second
    pub rate: u32,
    /// 1 (mono) or 2 (stereo)
    pub channels: u16,
    /// Frames per device callback, also the resampler chunk size
    pub frame_size: u32,
    pub format: SampleFormat,
}

impl DeviceSpec {
    pub fn new(rate: u32, channels: u16, frame_size: u32, format: SampleFormat) -> Self {
        Self {
            rate,
            channels,
            frame_size,
            format,
        }
    }

    /// Interleaved samples in one callback buffer
    pub fn buffer_samples(&self) -> usize {
        self.frame_size as usize * self.channels as usize
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }
}

/// Map a cpal sample format (always host byte order) to ours.
pub fn format_from_cpal(format: cpal::SampleFormat) -> Option<SampleFormat> {
    match format {
        cpal::SampleFormat::I8 => Some(SampleFormat::S8),
        cpal::SampleFormat::U8 => Some(SampleFormat::U8),
        cpal::SampleFormat::I16 => Some(SampleFormat::S16),
        cpal::SampleFormat::U16 => Some(SampleFormat::U16),
        cpal::SampleFormat::I32 => Some(SampleFormat::S32),
        cpal::SampleFormat::F32 => Some(SampleFormat::F32),
        _ => None,
    }
}

/// Map our format to cpal. Formats in foreign byte order have no cpal equivalent.
pub fn format_to_cpal(format: SampleFormat) -> Option<cpal::SampleFormat> {
    match format {
        SampleFormat::S8 => Some(cpal::SampleFormat::I8),
        SampleFormat::U8 => Some(cpal::SampleFormat::U8),
        f if f == SampleFormat::S16 => Some(cpal::SampleFormat::I16),
        f if f == SampleFormat::U16 => Some(cpal::SampleFormat::U16),
        f if f == SampleFormat::S32 => Some(cpal::SampleFormat::I32),
        f if f == SampleFormat::F32 => Some(cpal::SampleFormat::F32),
        _ => None,
    }
}

/// Audio output device
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: cpal::SampleFormat,
    spec: DeviceSpec,
    stream: Option<cpal::Stream>,
    /// Set by the stream error callback
    error_flag: Arc<AtomicBool>,
    error_count: Arc<AtomicU32>,
}

impl AudioOutput {
    /// List available output device names.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an output device.
    ///
    /// # Arguments
    /// - `device_name`: Device to open (None = default device). A device that
    ///   cannot be found falls back to the default device.
    /// - `wanted`: Requested spec. The obtained spec ([`AudioOutput::spec`]) may
    ///   differ in rate, channel count and format.
    ///
    /// # Errors
    /// - No output device available
    /// - The device offers no mono or stereo configuration in a supported format
    pub fn open(device_name: Option<&str>, wanted: DeviceSpec) -> Result<Self> {
        let host = cpal::default_host();
        let device = Self::find_device(&host, device_name)?;
        let (config, sample_format, spec) = Self::negotiate(&device, wanted)?;

        info!(
            "Audio output opened: {} Hz, {} ch, {} frames, {}",
            spec.rate, spec.channels, spec.frame_size, spec.format
        );
        if spec != wanted {
            debug!("Requested spec {:?} differs from obtained {:?}", wanted, spec);
        }

        Ok(Self {
            device,
            config,
            sample_format,
            spec,
            stream: None,
            error_flag: Arc::new(AtomicBool::new(false)),
            error_count: Arc::new(AtomicU32::new(0)),
        })
    }

    fn find_device(host: &cpal::Host, device_name: Option<&str>) -> Result<Device> {
        if let Some(name) = device_name {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

            if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                info!("Found requested audio device: {}", name);
                return Ok(device);
            }
            warn!("Requested device '{}' not found, falling back to default device", name);
        }

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;
        info!(
            "Using default audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Ok(device)
    }

    /// Pick the supported configuration closest to `wanted`.
    ///
    /// Preference order: channel count, then sample format, then rate.
    fn negotiate(device: &Device, wanted: DeviceSpec) -> Result<(StreamConfig, cpal::SampleFormat, DeviceSpec)> {
        let ranges: Vec<SupportedStreamConfigRange> = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?
            .filter(|range| {
                (1..=2).contains(&range.channels()) && format_from_cpal(range.sample_format()).is_some()
            })
            .collect();

        let wanted_format = format_to_cpal(wanted.format);
        let score = |range: &SupportedStreamConfigRange| {
            let channels = range.channels() == wanted.channels;
            let format = Some(range.sample_format()) == wanted_format;
            let rate = range.min_sample_rate().0 <= wanted.rate && wanted.rate <= range.max_sample_rate().0;
            (channels, format, rate)
        };

        let range = ranges
            .iter()
            .max_by_key(|&range| score(range))
            .ok_or_else(|| {
                Error::UnsupportedFormat("Device has no mono or stereo output in a supported format".to_string())
            })?;

        let rate = wanted
            .rate
            .clamp(range.min_sample_rate().0, range.max_sample_rate().0);
        let supported = range.clone().with_sample_rate(cpal::SampleRate(rate));
        let sample_format = supported.sample_format();
        let mut config = supported.config();

        if let SupportedBufferSize::Range { min, max } = supported.buffer_size() {
            if (*min..=*max).contains(&wanted.frame_size) {
                config.buffer_size = BufferSize::Fixed(wanted.frame_size);
            }
        }

        let format = format_from_cpal(sample_format).ok_or_else(|| {
            Error::UnsupportedFormat(format!("Unsupported device sample format: {:?}", sample_format))
        })?;

        let spec = DeviceSpec {
            rate,
            channels: config.channels,
            frame_size: wanted.frame_size,
            format,
        };
        Ok((config, sample_format, spec))
    }

    /// The obtained output spec. Build the [`Mixer`] from this.
    pub fn spec(&self) -> DeviceSpec {
        self.spec
    }

    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown".to_string())
    }

    /// Start pulling audio from `mixer`.
    ///
    /// # Errors
    /// - `mixer` was built for a different rate, channel count or sample format
    /// - The device stream cannot be built or started
    pub fn start<S: Sample>(&mut self, mixer: Mixer<S>) -> Result<()> {
        check_mixer_spec(mixer.spec(), self.spec)?;
        if self.stream.is_some() {
            self.stop()?;
        }

        info!("Starting audio stream");
        let error_flag = Arc::clone(&self.error_flag);
        let error_count = Arc::clone(&self.error_count);

        let stream = self
            .device
            .build_output_stream_raw(
                &self.config,
                self.sample_format,
                move |data: &mut cpal::Data, _: &cpal::OutputCallbackInfo| {
                    mixer.mix_into(data.bytes_mut());
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                    error_count.fetch_add(1, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        self.stream = Some(stream);
        info!("Audio stream started successfully");
        Ok(())
    }

    /// Stop the device stream. The device callback is not called again after this.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            info!("Stopping audio stream");
            stream
                .pause()
                .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))?;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }

    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::SeqCst)
    }
}

/// A mixer can only feed a device negotiated for the same rate, channels and format.
/// The frame size may differ: the callback asks for whatever the host delivers.
fn check_mixer_spec(mixer: DeviceSpec, device: DeviceSpec) -> Result<()> {
    if mixer.rate != device.rate || mixer.channels != device.channels || mixer.format != device.format {
        return Err(Error::InvalidState(format!(
            "Mixer spec {:?} does not match device spec {:?}",
            mixer, device
        )));
    }
    Ok(())
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("{}", e);
        }
    }
}
