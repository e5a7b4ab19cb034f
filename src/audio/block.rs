//! Fixed-size byte blocks of captured audio

#![allow(dead_code)]

use super::decode::bytes_to_sample;

/// Number of bytes per PCM16 sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// One capture frame of raw audio bytes.
///
/// The length is fixed at construction and stays constant for the lifetime of
/// a session. Samples are stored high byte first (see [`bytes_to_sample`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleBlock {
    data: Box<[u8]>,
}

impl SampleBlock {
    /// Create a zero-filled block of `len` bytes.
    pub fn new(len: usize) -> Self {
        debug_assert!(len % BYTES_PER_SAMPLE == 0, "block length must be even");
        Self {
            data: vec![0u8; len].into_boxed_slice(),
        }
    }

    /// Create a block owning a copy of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() % BYTES_PER_SAMPLE == 0, "block length must be even");
        Self {
            data: bytes.to_vec().into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of PCM16 samples the block holds.
    pub fn sample_count(&self) -> usize {
        self.data.len() / BYTES_PER_SAMPLE
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Iterate the block's bytes two at a time as decoded samples.
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.data
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| bytes_to_sample(pair[0], pair[1]))
    }
}
