//! Audio system lifetime
//!
//! [`AudioSystem`] ties a [`Mixer`] to an output device (or to nothing, when the
//! application drives the mixer itself) and builds streams with the configured
//! decoder and resampler. Dropping it shuts everything down.

use crate::audio::{decoder_for, AudioOutput, DeviceSpec, Sample, Source};
use crate::config::{EngineConfig, ResamplerKind};
use crate::error::{Error, Result};
use crate::playback::{Mixer, Stream};
use audiomix_common::{FadeCurve, SystemClock};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Mixer plus optional output device
pub struct AudioSystem<S: Sample = f32> {
    mixer: Mixer<S>,
    output: Option<AudioOutput>,
    resampler: ResamplerKind,
}

impl<S: Sample> AudioSystem<S> {
    /// Open the configured output device and start mixing into it.
    ///
    /// # Errors
    /// - Invalid output settings
    /// - No usable output device
    /// - The device stream cannot be started
    pub fn init(config: &EngineConfig) -> Result<Self> {
        let wanted = config.device_spec()?;
        let mut output = AudioOutput::open(config.output.device.as_deref(), wanted)?;
        let mixer = Mixer::with_options(
            output.spec(),
            Arc::new(SystemClock::new()),
            config.engine.fade_curve,
        )?;
        output.start(mixer.clone())?;

        info!("Audio system initialised on {}", output.device_name());
        Ok(Self {
            mixer,
            output: Some(output),
            resampler: config.engine.resampler,
        })
    }

    /// Set up mixing without a device. The caller pulls audio with
    /// [`Mixer::mix`] or [`Mixer::mix_into`].
    pub fn init_without_output(
        spec: DeviceSpec,
        fade_curve: FadeCurve,
        resampler: ResamplerKind,
    ) -> Result<Self> {
        let mixer = Mixer::with_options(spec, Arc::new(SystemClock::new()), fade_curve)?;
        info!("Audio system initialised without output device");
        Ok(Self::with_mixer(mixer, resampler))
    }

    /// Wrap an existing device-less mixer.
    pub fn with_mixer(mixer: Mixer<S>, resampler: ResamplerKind) -> Self {
        Self {
            mixer,
            output: None,
            resampler,
        }
    }

    pub fn mixer(&self) -> &Mixer<S> {
        &self.mixer
    }

    pub fn spec(&self) -> DeviceSpec {
        self.mixer.spec()
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn device_name(&self) -> Option<String> {
        self.output.as_ref().map(|output| output.device_name())
    }

    /// Create a stream for a file, probing for a decoder.
    ///
    /// # Errors
    /// - The file cannot be opened
    /// - No decoder recognises its contents
    pub fn open_file(&self, path: impl AsRef<Path>) -> Result<Stream<S>> {
        let source = Source::from_file(path)?;
        self.open_source(source, true)
    }

    /// Create a stream over `source`, probing for a decoder.
    pub fn open_source(&self, source: Source, close_source: bool) -> Result<Stream<S>> {
        let decoder = decoder_for::<S>(&source)
            .ok_or_else(|| Error::Open(format!("No decoder recognises {}", source.name())))?;
        Ok(Stream::new(
            &self.mixer,
            source,
            decoder,
            self.resampler.build(),
            close_source,
        ))
    }

    /// Stop the device, then every playing stream.
    pub fn quit(&mut self) {
        if let Some(mut output) = self.output.take() {
            if let Err(e) = output.stop() {
                warn!("{}", e);
            }
        }
        self.mixer.stop_all();
    }
}

impl<S: Sample> Drop for AudioSystem<S> {
    fn drop(&mut self) {
        self.quit();
    }
}
