//! Consumer-side waveform assembly
//!
//! Called once per render frame: drain one block from the ring, decode it,
//! and extend the bounded waveform. The waveform's cursor is measured in
//! seconds from the left edge; once it passes the viewport bound the sequence
//! clears, the cursor rewinds, and the renderer is told to reset its backing
//! store.

#![allow(dead_code)]

use log::debug;

use crate::audio::decode::{normalize, to_decibels};
use crate::audio::ring::BlockRing;
use crate::config::Config;

/// One drawable waveform point. `x` is seconds from the left edge, `y` is a
/// normalized amplitude compressed to [-0.5, 0.5].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayPoint {
    pub x: f32,
    pub y: f32,
}

/// What the renderer accepts: a connected strip of points once per frame,
/// and a reset command that clears its backing store and offset.
pub trait Surface {
    fn draw(&mut self, points: &[DisplayPoint]);
    fn reset(&mut self);
}

/// Result of one frame's pull.
pub struct FrameUpdate {
    /// Points appended this frame. Empty when no block was ready.
    pub appended: Vec<DisplayPoint>,
    /// The waveform wrapped; the surface must clear before drawing.
    pub reset: bool,
    /// Peak level of this frame's block in dB,
    /// [`SILENCE_DB`](crate::audio::decode::SILENCE_DB) for an all-zero
    /// block, `None` when no block was ready.
    pub peak_db: Option<f32>,
}

/// Bounded wrapping sequence of on-screen points. Consumer-thread only.
pub struct Waveform {
    points: Vec<DisplayPoint>,
    capacity: usize,
    cursor: f32,
    bound: f32,
    step: f32,
}

impl Waveform {
    fn new(capacity: usize, bound: f32, step: f32) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            capacity,
            cursor: 0.0,
            bound,
            step,
        }
    }

    fn append(&mut self, y: f32) -> DisplayPoint {
        let point = DisplayPoint { x: self.cursor, y };
        if self.points.len() < self.capacity {
            self.points.push(point);
        }
        self.cursor += self.step;
        point
    }

    fn past_bound(&self) -> bool {
        self.cursor > self.bound
    }

    fn rewind(&mut self) {
        self.points.clear();
        self.cursor = 0.0;
    }

    pub fn points(&self) -> &[DisplayPoint] {
        &self.points
    }

    pub fn cursor(&self) -> f32 {
        self.cursor
    }
}

/// Per-frame consumer of the block ring.
pub struct DisplayFeed {
    ring: BlockRing,
    waveform: Waveform,
}

impl DisplayFeed {
    pub fn new(ring: BlockRing, config: &Config) -> Self {
        let step = 1.0 / config.sample_rate as f32;
        let waveform = Waveform::new(config.waveform_capacity(), config.viewport_seconds, step);
        Self { ring, waveform }
    }

    pub fn waveform(&self) -> &Waveform {
        &self.waveform
    }

    /// Drain one block and extend the waveform.
    ///
    /// An empty ring is not a fault: the frame renders the previous waveform
    /// unchanged.
    pub fn pull(&mut self) -> FrameUpdate {
        let mut reset = false;
        if self.waveform.past_bound() {
            self.waveform.rewind();
            reset = true;
            debug!("Waveform wrapped");
        }

        let Some(block) = self.ring.try_pop() else {
            return FrameUpdate {
                appended: Vec::new(),
                reset,
                peak_db: None,
            };
        };

        let mut appended = Vec::with_capacity(block.sample_count());
        let mut peak: i16 = 0;
        for sample in block.samples() {
            if sample.unsigned_abs() > peak.unsigned_abs() {
                peak = sample;
            }
            appended.push(self.waveform.append(normalize(sample) / 2.0));
        }

        FrameUpdate {
            appended,
            reset,
            peak_db: Some(to_decibels(peak)),
        }
    }
}
