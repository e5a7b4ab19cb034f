//! Command-line interface for wavescope
//!
//! Handles argument parsing, logging configuration, and config overrides.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::LevelFilter;

use crate::config::Config;

/// Where the capture bytes come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Capture from the sound server (default input unless --device is set).
    Device,
    /// Synthesized sine tone.
    Sine,
    /// 16-bit WAV file, looped.
    File,
}

/// wavescope - live audio waveform viewer
#[derive(Parser, Debug)]
#[command(name = "wavescope")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase logging verbosity
    /// -v = info, -vv = debug, -vvv = trace (includes pipewire)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Configuration file (JSON); defaults to the platform config directory
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Audio source to visualize
    #[arg(long, value_enum, default_value_t = SourceKind::Device)]
    pub source: SourceKind,

    /// WAV file to play when --source file
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Tone frequency in Hz when --source sine
    #[arg(long, default_value_t = 440.0)]
    pub freq: f32,

    /// Capture target node (overrides config)
    #[arg(long)]
    pub device: Option<String>,

    /// Sample rate in Hz (overrides config)
    #[arg(long)]
    pub rate: Option<u32>,

    /// Render frames per second (overrides config frame interval)
    #[arg(long)]
    pub fps: Option<f64>,

    /// Viewport width in seconds (overrides config)
    #[arg(long)]
    pub viewport: Option<f32>,

    /// Stop after this many seconds (default: run until killed)
    #[arg(long)]
    pub duration: Option<f64>,

    /// Terminal surface width in columns
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Terminal surface height in rows
    #[arg(long, default_value_t = 21)]
    pub height: usize,
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    /// Fold command-line overrides into a loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(device) = &self.device {
            config.device = Some(device.clone());
        }
        if let Some(rate) = self.rate {
            config.sample_rate = rate;
        }
        if let Some(fps) = self.fps {
            config.frame_interval = 1.0 / fps;
        }
        if let Some(viewport) = self.viewport {
            config.viewport_seconds = viewport;
        }
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Base level for all modules - keep at warn to suppress noisy deps
    builder.filter_level(LevelFilter::Warn);

    // Set wavescope modules to requested verbosity level
    builder.filter_module("wavescope", args.log_level());

    // PipeWire internals only at -vvv
    if args.verbose >= 3 {
        builder.filter_module("pipewire", args.log_level());
    }

    builder.format_timestamp_millis().init();
}
