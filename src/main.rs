//! wavescope - a live audio waveform viewer for Linux
//!
//! This is the main entry point: it wires a capture backend, the producer
//! session, and the per-frame display feed to a terminal surface.

mod audio;
mod cli;
mod config;
mod display;
mod term;

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use log::{debug, info};

use audio::{BlockRing, CaptureBackend, CaptureSession, DeviceBackend, SineBackend, WavBackend};
use cli::SourceKind;
use config::Config;
use display::{DisplayFeed, Surface};
use term::TermSurface;

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments and initialize logging
    let args = cli::Args::parse();
    cli::init_logging(&args);

    let config = resolve_config(&args)?;
    info!(
        "Starting wavescope: {} Hz, {}-byte blocks, {:.2} s viewport",
        config.sample_rate,
        config.block_len(),
        config.viewport_seconds
    );

    let backend: Box<dyn CaptureBackend> = match args.source {
        SourceKind::Device => Box::new(DeviceBackend::open(&config)?),
        SourceKind::Sine => Box::new(SineBackend::new(args.freq, &config)),
        SourceKind::File => {
            let path = args.file.as_ref().context("--source file requires --file")?;
            Box::new(WavBackend::open(path, &config)?)
        }
    };

    let ring = BlockRing::with_capacity(config.ring_capacity());
    let mut session = CaptureSession::new(backend, ring.clone(), config.block_len());
    let mut feed = DisplayFeed::new(ring, &config);
    let mut surface = TermSurface::new(args.width, args.height, config.viewport_seconds);

    session.start();
    run_render_loop(&mut feed, &mut surface, &config, args.duration);
    session.stop();

    Ok(())
}

/// Load the config file (explicit, or the default location when present) and
/// fold in the command-line overrides.
fn resolve_config(args: &cli::Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => match Config::default_path() {
            Some(path) if path.exists() => Config::load(&path)?,
            _ => Config::default(),
        },
    };
    args.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}

/// The frame loop: pull once per frame, draw, sleep out the remainder.
fn run_render_loop(
    feed: &mut DisplayFeed,
    surface: &mut dyn Surface,
    config: &Config,
    duration: Option<f64>,
) {
    let frame = config.frame_duration();
    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs_f64(secs));

    surface.reset();
    loop {
        let frame_start = Instant::now();

        let update = feed.pull();
        if update.reset {
            surface.reset();
        }
        surface.draw(feed.waveform().points());
        if let Some(peak_db) = update.peak_db {
            debug!(
                "Frame: {} new points, peak {:.1} dB",
                update.appended.len(),
                peak_db
            );
        }

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                break;
            }
        }
        thread::sleep(frame.saturating_sub(frame_start.elapsed()));
    }
}
