//! Audio capture pipeline
//!
//! This module provides:
//! - Fixed-size PCM16 sample blocks and their decoding
//! - The blocking capture-backend capability and its device/file/sine variants
//! - The bounded block ring shared between the capture and render threads
//! - The capture session that owns the producer thread

pub mod backend;
pub mod block;
pub mod decode;
pub mod device;
pub mod ring;
pub mod session;

pub use backend::{BackendError, CaptureBackend, SineBackend, WavBackend};
pub use block::SampleBlock;
pub use device::DeviceBackend;
pub use ring::BlockRing;
pub use session::{CaptureSession, SessionState};
