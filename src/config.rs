//! Pipeline configuration
//!
//! One explicit structure carries every tunable the pipeline recognizes; the
//! block, ring, and waveform sizes are all derived from it. Values load from
//! an optional JSON file and are overridden by command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::audio::block::BYTES_PER_SAMPLE;

/// Capture and display configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Target render frame interval in seconds; drives the block size.
    pub frame_interval: f64,
    /// Seconds of audio spanned by the viewport; drives waveform and ring
    /// capacity.
    pub viewport_seconds: f32,
    /// Capture target node. `None` lets the sound server pick.
    pub device: Option<String>,
    /// Label the capture stream is registered under.
    pub stream_label: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            frame_interval: 1.0 / 60.0,
            viewport_seconds: 1.0,
            device: None,
            stream_label: "recorder".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config file {:?}", path))?;
        Ok(config)
    }

    /// Default config file location, when the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("wavescope").join("config.json"))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.sample_rate > 0, "sample rate must be positive");
        anyhow::ensure!(
            self.frame_interval > 0.0 && self.frame_interval.is_finite(),
            "frame interval must be positive"
        );
        anyhow::ensure!(
            self.viewport_seconds > 0.0 && self.viewport_seconds.is_finite(),
            "viewport seconds must be positive"
        );
        Ok(())
    }

    /// Samples per capture block: one frame interval's worth, rounded up to
    /// an even count.
    pub fn samples_per_block(&self) -> usize {
        let raw = (self.sample_rate as f64 * self.frame_interval) as usize;
        raw + 2 - raw % 2
    }

    /// Capture block size in bytes.
    pub fn block_len(&self) -> usize {
        self.samples_per_block() * BYTES_PER_SAMPLE
    }

    /// Ring capacity in blocks: the viewport's worth of audio plus one block
    /// of slack.
    pub fn ring_capacity(&self) -> usize {
        let viewport_samples = (self.sample_rate as f64 * self.viewport_seconds as f64) as usize;
        viewport_samples.div_ceil(self.samples_per_block()) + 1
    }

    /// Waveform point capacity: the viewport's worth of samples plus one
    /// block of slack for the frame that overshoots the right edge.
    pub fn waveform_capacity(&self) -> usize {
        let viewport_samples = (self.sample_rate as f64 * self.viewport_seconds as f64) as usize;
        viewport_samples + self.samples_per_block()
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_interval)
    }
}
