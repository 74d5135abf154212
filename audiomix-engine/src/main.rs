//! audiomix-play - play audio files through the mixer
//!
//! Every file given on the command line is opened as its own stream and
//! started at the same time. The program exits once all streams finish.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use audiomix_common::FadeCurve;
use audiomix_engine::audio::AudioOutput;
use audiomix_engine::config::SampleType;
use audiomix_engine::{AudioSystem, EngineConfig, Sample, Stream};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for audiomix-play
#[derive(Parser, Debug)]
#[command(name = "audiomix-play")]
#[command(about = "Play audio files simultaneously through the audiomix engine")]
#[command(version)]
struct Args {
    /// Audio files to play
    files: Vec<PathBuf>,

    /// Config file (default: AUDIOMIX_CONFIG, then the per-user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output device name (overrides the config file)
    #[arg(short, long, env = "AUDIOMIX_DEVICE")]
    device: Option<String>,

    /// Times to play each file (0 = loop forever)
    #[arg(short, long, default_value = "1")]
    loops: u32,

    /// Fade-in time in milliseconds
    #[arg(long, default_value = "0")]
    fade_in_ms: u64,

    /// Stream volume
    #[arg(long, default_value = "1.0")]
    volume: f32,

    /// Stereo position, -1.0 (left) to 1.0 (right)
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    pan: f32,

    /// Fade curve: linear, cubic or scurve (overrides the config file)
    #[arg(long)]
    fade_curve: Option<FadeCurve>,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        EngineConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if args.device.is_some() {
        config.output.device = args.device.clone();
    }
    if let Some(curve) = args.fade_curve {
        config.engine.fade_curve = curve;
    }

    // Initialize tracing
    let default_filter = format!(
        "audiomix_engine={0},audiomix_common={0},audiomix_play={0}",
        config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.list_devices {
        for name in AudioOutput::list_devices().context("Failed to list output devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    if args.files.is_empty() {
        bail!("No input files given");
    }

    match config.engine.sample_type {
        SampleType::Float => run::<f32>(&args, &config),
        SampleType::Int32 => run::<i32>(&args, &config),
    }
}

fn run<S: Sample>(args: &Args, config: &EngineConfig) -> Result<()> {
    let mut system =
        AudioSystem::<S>::init(config).context("Failed to initialize audio system")?;
    let spec = system.spec();
    info!(
        "Output: {} Hz, {} ch, {} ({:?} pipeline)",
        spec.rate, spec.channels, spec.format, config.engine.sample_type
    );

    let fade = Duration::from_millis(args.fade_in_ms);
    let mut streams: Vec<Stream<S>> = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let stream = match system.open_file(path) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        stream.set_volume(args.volume);
        stream.set_stereo_position(args.pan);

        let name = path.display().to_string();
        stream.set_finish_callback(move |_| info!("Finished {}", name));

        if let Err(e) = stream.play(args.loops, fade) {
            warn!("Cannot play {}: {}", path.display(), e);
            continue;
        }
        info!("Playing {} ({:?})", path.display(), stream.duration());
        streams.push(stream);
    }

    if streams.is_empty() {
        bail!("Nothing to play");
    }

    while streams.iter().any(|stream| stream.is_playing()) {
        thread::sleep(Duration::from_millis(100));
    }

    drop(streams);
    system.quit();
    info!("Playback complete");
    Ok(())
}
