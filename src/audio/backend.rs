//! Capture backends
//!
//! A backend supplies raw audio bytes on demand: a blocking read fills one
//! [`SampleBlock`] at a time, high byte first, mono PCM16. The device-backed
//! variant lives in [`super::device`]; this module holds the capability trait
//! the producer thread consumes plus the file and synthetic variants.

#![allow(dead_code)]

use std::f32::consts::TAU;
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::audio::block::{SampleBlock, BYTES_PER_SAMPLE};
use crate::config::Config;

/// Errors that can occur in a capture backend.
#[derive(Debug, Clone)]
pub enum BackendError {
    /// The backend could not be opened. Fatal: the session cannot be built.
    Open(String),
    /// A single read failed. The producer loop skips the push and continues.
    Read(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Open(e) => write!(f, "failed to open capture backend: {}", e),
            BackendError::Read(e) => write!(f, "failed to read audio block: {}", e),
        }
    }
}

impl std::error::Error for BackendError {}

/// A source of raw audio bytes.
///
/// `read` blocks until the block is exactly filled or the backend fails; it
/// performs no buffering beyond what the underlying driver already does.
/// Closing is dropping.
pub trait CaptureBackend: Send {
    fn read(&mut self, block: &mut SampleBlock) -> Result<(), BackendError>;
}

/// Synthesized sine tone source.
///
/// Paced to real time by default so the pipeline behaves like a device.
pub struct SineBackend {
    phase: f32,
    phase_step: f32,
    sample_rate: u32,
    paced: bool,
}

impl SineBackend {
    pub fn new(frequency: f32, config: &Config) -> Self {
        Self {
            phase: 0.0,
            phase_step: TAU * frequency / config.sample_rate as f32,
            sample_rate: config.sample_rate,
            paced: true,
        }
    }

    /// Disable real-time pacing (reads return immediately).
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }
}

impl CaptureBackend for SineBackend {
    fn read(&mut self, block: &mut SampleBlock) -> Result<(), BackendError> {
        const AMPLITUDE: f32 = 0.6;
        for pair in block.as_mut_bytes().chunks_exact_mut(BYTES_PER_SAMPLE) {
            let sample = (self.phase.sin() * AMPLITUDE * f32::from(i16::MAX)) as i16;
            pair.copy_from_slice(&sample.to_be_bytes());
            self.phase = (self.phase + self.phase_step) % TAU;
        }
        if self.paced {
            thread::sleep(block_duration(block, self.sample_rate));
        }
        Ok(())
    }
}

/// WAV file source.
///
/// Loads a 16-bit WAV up front and serves it block by block, looping at end
/// of file. Multi-channel files contribute their first channel only.
pub struct WavBackend {
    samples: Vec<i16>,
    cursor: usize,
    sample_rate: u32,
    paced: bool,
}

impl WavBackend {
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self, BackendError> {
        let reader = hound::WavReader::open(path.as_ref())
            .map_err(|e| BackendError::Open(e.to_string()))?;

        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(BackendError::Open(format!(
                "expected 16-bit integer WAV, got {}-bit {:?}",
                spec.bits_per_sample, spec.sample_format
            )));
        }

        let channels = spec.channels.max(1) as usize;
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .step_by(channels)
            .collect::<Result<_, _>>()
            .map_err(|e| BackendError::Open(e.to_string()))?;

        if samples.is_empty() {
            return Err(BackendError::Open("WAV file contains no samples".to_string()));
        }

        log::info!(
            "Loaded {} samples at {} Hz from {:?}",
            samples.len(),
            spec.sample_rate,
            path.as_ref()
        );

        Ok(Self {
            samples,
            cursor: 0,
            sample_rate: config.sample_rate,
            paced: true,
        })
    }

    /// Disable real-time pacing (reads return immediately).
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }
}

impl CaptureBackend for WavBackend {
    fn read(&mut self, block: &mut SampleBlock) -> Result<(), BackendError> {
        for pair in block.as_mut_bytes().chunks_exact_mut(BYTES_PER_SAMPLE) {
            let sample = self.samples[self.cursor];
            pair.copy_from_slice(&sample.to_be_bytes());
            self.cursor = (self.cursor + 1) % self.samples.len();
        }
        if self.paced {
            thread::sleep(block_duration(block, self.sample_rate));
        }
        Ok(())
    }
}

fn block_duration(block: &SampleBlock, sample_rate: u32) -> Duration {
    Duration::from_secs_f64(block.sample_count() as f64 / sample_rate.max(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn test_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_sine_fills_blocks() {
        let mut backend = SineBackend::new(440.0, &test_config()).paced(false);
        let mut block = SampleBlock::new(64);
        backend.read(&mut block).unwrap();
        // A 440 Hz tone at 0.6 amplitude is not silence.
        assert!(block.samples().any(|s| s.unsigned_abs() > 1000));
        // Phase continues across reads.
        let first: Vec<i16> = block.samples().collect();
        backend.read(&mut block).unwrap();
        let second: Vec<i16> = block.samples().collect();
        assert_ne!(first, second);
    }

    fn write_wav(samples: &[i16], channels: u16) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        let spec = hound::WavSpec {
            channels,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(file.path(), spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        file
    }

    #[test]
    fn test_wav_serves_file_order_and_loops() {
        let file = write_wav(&[100, 200, 300], 1);
        let mut backend = WavBackend::open(file.path(), &test_config())
            .unwrap()
            .paced(false);
        let mut block = SampleBlock::new(8);
        backend.read(&mut block).unwrap();
        let samples: Vec<i16> = block.samples().collect();
        assert_eq!(samples, vec![100, 200, 300, 100]);
    }

    #[test]
    fn test_wav_takes_first_channel() {
        let file = write_wav(&[1, -1, 2, -2], 2);
        let mut backend = WavBackend::open(file.path(), &test_config())
            .unwrap()
            .paced(false);
        let mut block = SampleBlock::new(4);
        backend.read(&mut block).unwrap();
        let samples: Vec<i16> = block.samples().collect();
        assert_eq!(samples, vec![1, 2]);
    }

    #[test]
    fn test_wav_rejects_non_pcm16() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(file.path(), spec).unwrap();
        writer.write_sample(0.5f32).unwrap();
        writer.finalize().unwrap();

        match WavBackend::open(file.path(), &test_config()) {
            Err(BackendError::Open(_)) => {}
            other => panic!("expected open error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_wav_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a wav file").unwrap();
        assert!(matches!(
            WavBackend::open(file.path(), &test_config()),
            Err(BackendError::Open(_))
        ));
    }
}
