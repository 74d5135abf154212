//! Engine configuration
//!
//! Loaded from TOML. Every field has a default, so an empty or missing file
//! yields a working 44.1 kHz stereo configuration.
//!
//! ```toml
//! [output]
//! sample_rate = 48000
//! channels = 2
//! frame_size = 1024
//! format = "f32"
//! device = "USB Audio"
//!
//! [engine]
//! sample_type = "float"
//! fade_curve = "cubic"
//! resampler = "rubato"
//!
//! [logging]
//! level = "debug"
//! ```

use crate::audio::backends::{LinearBackend, RubatoBackend};
use crate::audio::{DeviceSpec, Resampler, Sample, SampleFormat};
use crate::error::{Error, Result};
use audiomix_common::config::{load_or_default, CONFIG_ENV_VAR};
use audiomix_common::FadeCurve;
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

/// Application name used for the per-user config directory
pub const APP_NAME: &str = "audiomix";

/// Complete engine configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub output: OutputSettings,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Requested output device settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputSettings {
    /// Default: 44100
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// 1 or 2. Default: 2
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Frames per device callback. Default: 4096
    #[serde(default = "default_frame_size")]
    pub frame_size: u32,

    /// Device sample format name (e.g. `s16`, `f32lsb`). Default: `s16`
    #[serde(default = "default_format")]
    pub format: String,

    /// Output device name (None = default device)
    #[serde(default)]
    pub device: Option<String>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            frame_size: default_frame_size(),
            format: default_format(),
            device: None,
        }
    }
}

/// Mixing pipeline settings
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EngineSettings {
    #[serde(default)]
    pub sample_type: SampleType,

    #[serde(default)]
    pub fade_curve: FadeCurve,

    #[serde(default)]
    pub resampler: ResamplerKind,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Internal sample type of the mixing pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    #[default]
    Float,
    Int32,
}

/// Resampler attached to each stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResamplerKind {
    #[default]
    Rubato,
    Linear,
    /// Decoder output goes straight to the mixer
    None,
}

impl ResamplerKind {
    /// Build an unbound resampler of this kind.
    pub fn build<S: Sample>(&self) -> Option<Resampler<S>> {
        match self {
            ResamplerKind::Rubato => Some(Resampler::new(Box::new(RubatoBackend::new()))),
            ResamplerKind::Linear => Some(Resampler::new(Box::new(LinearBackend::new()))),
            ResamplerKind::None => None,
        }
    }
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_channels() -> u16 {
    2
}

fn default_frame_size() -> u32 {
    4096
}

fn default_format() -> String {
    "s16".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Load configuration.
    ///
    /// # Configuration Priority
    ///
    /// 1. `cli_path` (highest priority)
    /// 2. `AUDIOMIX_CONFIG` environment variable
    /// 3. `<config_dir>/audiomix/config.toml`
    /// 4. Built-in defaults
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - A config file exists but cannot be parsed
    /// - The loaded values fail [`EngineConfig::validate`]
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let mut config: EngineConfig = load_or_default(cli_path, CONFIG_ENV_VAR, APP_NAME)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values and clamp the channel count to 1..=2.
    pub fn validate(&mut self) -> Result<()> {
        if self.output.sample_rate == 0 {
            return Err(Error::Config("output.sample_rate must be greater than 0".to_string()));
        }
        if self.output.frame_size == 0 {
            return Err(Error::Config("output.frame_size must be greater than 0".to_string()));
        }
        if !(1..=2).contains(&self.output.channels) {
            let clamped = self.output.channels.clamp(1, 2);
            warn!(
                "output.channels = {} is not supported, using {}",
                self.output.channels, clamped
            );
            self.output.channels = clamped;
        }
        self.sample_format()
            .map_err(|e| Error::Config(format!("output.format: {}", e)))?;
        Ok(())
    }

    pub fn sample_format(&self) -> Result<SampleFormat> {
        self.output.format.parse()
    }

    /// Requested output spec
    pub fn device_spec(&self) -> Result<DeviceSpec> {
        Ok(DeviceSpec::new(
            self.output.sample_rate,
            self.output.channels,
            self.output.frame_size,
            self.sample_format()?,
        ))
    }
}
