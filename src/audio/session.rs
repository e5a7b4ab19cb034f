//! Capture session lifecycle and producer thread
//!
//! A session owns one backend handle and one block ring. The producer thread
//! is spawned at construction and parks on a condition variable until
//! `start()`; from then on it alternates blocking backend reads with ring
//! pushes until `stop()`. Read failures are contained here: the iteration is
//! skipped and the loop keeps going, so a broken backend shows up as a
//! frozen waveform rather than a dead thread.

#![allow(dead_code)]

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use super::backend::CaptureBackend;
use super::block::SampleBlock;
use super::ring::BlockRing;

/// Delay before retrying after a failed backend read.
const READ_RETRY_DELAY: Duration = Duration::from_millis(25);

/// Lifecycle state of a capture session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Created,
    WaitingToStart,
    Capturing,
    Stopped,
}

struct SessionShared {
    state: Mutex<SessionState>,
    cond: Condvar,
}

impl SessionShared {
    fn current(&self) -> SessionState {
        *self.state.lock().unwrap()
    }
}

/// Owns the capture backend and the producer thread.
pub struct CaptureSession {
    shared: Arc<SessionShared>,
    ring: BlockRing,
    handle: Option<JoinHandle<()>>,
}

impl CaptureSession {
    /// Build a session around `backend` and spawn its producer thread.
    ///
    /// The thread blocks on the session's condition variable until
    /// [`start`](Self::start); no backend read happens before that.
    pub fn new(backend: Box<dyn CaptureBackend>, ring: BlockRing, block_len: usize) -> Self {
        let shared = Arc::new(SessionShared {
            state: Mutex::new(SessionState::Created),
            cond: Condvar::new(),
        });

        *shared.state.lock().unwrap() = SessionState::WaitingToStart;

        let thread_shared = shared.clone();
        let thread_ring = ring.clone();
        let handle = thread::spawn(move || {
            producer_loop(thread_shared, backend, thread_ring, block_len);
        });

        Self {
            shared,
            ring,
            handle: Some(handle),
        }
    }

    /// Another handle to the session's ring, for the consumer side.
    pub fn ring(&self) -> BlockRing {
        self.ring.clone()
    }

    pub fn state(&self) -> SessionState {
        self.shared.current()
    }

    /// Begin capturing. A no-op unless the session is waiting to start.
    pub fn start(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if matches!(*state, SessionState::Created | SessionState::WaitingToStart) {
            *state = SessionState::Capturing;
            self.shared.cond.notify_all();
            info!("Capture session started");
        }
    }

    /// Stop capturing and join the producer thread.
    ///
    /// Cooperative: an in-flight blocking read is not interrupted, so this
    /// can stall for up to one backend read.
    pub fn stop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            if *state == SessionState::Stopped {
                return;
            }
            *state = SessionState::Stopped;
            self.shared.cond.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        info!("Capture session stopped");
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn producer_loop(
    shared: Arc<SessionShared>,
    mut backend: Box<dyn CaptureBackend>,
    ring: BlockRing,
    block_len: usize,
) {
    // Start barrier: block until start() or stop() flips the state.
    {
        let state = shared.state.lock().unwrap();
        let state = shared
            .cond
            .wait_while(state, |s| *s == SessionState::WaitingToStart)
            .unwrap();
        if *state != SessionState::Capturing {
            debug!("Producer thread stopped before capture began");
            return;
        }
    }

    loop {
        if shared.current() != SessionState::Capturing {
            break;
        }
        let mut block = SampleBlock::new(block_len);
        match backend.read(&mut block) {
            Ok(()) => ring.push(block),
            Err(e) => {
                // Non-fatal: skip this iteration, keep the thread alive.
                warn!("{}", e);
                thread::sleep(READ_RETRY_DELAY);
            }
        }
    }
    debug!("Producer thread exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::BackendError;
    use std::sync::mpsc;
    use std::time::Instant;

    /// Serves a fixed list of blocks, then fails every read.
    struct ScriptedBackend {
        blocks: Vec<SampleBlock>,
        next: usize,
    }

    impl ScriptedBackend {
        fn new(tags: &[u8], block_len: usize) -> Self {
            let blocks = tags
                .iter()
                .map(|&tag| {
                    let mut block = SampleBlock::new(block_len);
                    block.as_mut_bytes()[0] = tag;
                    block
                })
                .collect();
            Self { blocks, next: 0 }
        }
    }

    impl CaptureBackend for ScriptedBackend {
        fn read(&mut self, block: &mut SampleBlock) -> Result<(), BackendError> {
            match self.blocks.get(self.next) {
                Some(scripted) => {
                    block.as_mut_bytes().copy_from_slice(scripted.as_bytes());
                    self.next += 1;
                    Ok(())
                }
                None => Err(BackendError::Read("script exhausted".to_string())),
            }
        }
    }

    /// Fails every other read.
    struct FlakyBackend {
        reads: u8,
    }

    impl CaptureBackend for FlakyBackend {
        fn read(&mut self, block: &mut SampleBlock) -> Result<(), BackendError> {
            self.reads += 1;
            if self.reads % 2 == 0 {
                return Err(BackendError::Read("transient fault".to_string()));
            }
            block.as_mut_bytes()[0] = self.reads;
            Ok(())
        }
    }

    /// Blocks inside read until released; models a stalled device.
    struct BlockingBackend {
        release: mpsc::Receiver<()>,
    }

    impl CaptureBackend for BlockingBackend {
        fn read(&mut self, _block: &mut SampleBlock) -> Result<(), BackendError> {
            self.release
                .recv()
                .map_err(|_| BackendError::Read("release channel closed".to_string()))
        }
    }

    fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        done()
    }

    #[test]
    fn test_waits_until_started() {
        let ring = BlockRing::with_capacity(4);
        let backend = Box::new(ScriptedBackend::new(&[1, 2, 3], 2));
        let mut session = CaptureSession::new(backend, ring.clone(), 2);

        assert_eq!(session.state(), SessionState::WaitingToStart);
        thread::sleep(Duration::from_millis(20));
        // No reads happen before start().
        assert!(ring.is_empty());

        session.start();
        assert_eq!(session.state(), SessionState::Capturing);
        assert!(wait_until(Duration::from_secs(1), || ring.len() == 3));
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);

        let tags: Vec<u8> = std::iter::from_fn(|| ring.try_pop())
            .map(|b| b.as_bytes()[0])
            .collect();
        assert_eq!(tags, vec![1, 2, 3]);
    }

    #[test]
    fn test_stop_before_start() {
        let ring = BlockRing::with_capacity(4);
        let backend = Box::new(ScriptedBackend::new(&[1], 2));
        let mut session = CaptureSession::new(backend, ring.clone(), 2);

        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(ring.is_empty());
        // Idempotent.
        session.stop();
    }

    #[test]
    fn test_read_failures_are_skipped() {
        let ring = BlockRing::with_capacity(16);
        let backend = Box::new(FlakyBackend { reads: 0 });
        let mut session = CaptureSession::new(backend, ring.clone(), 2);

        session.start();
        assert!(wait_until(Duration::from_secs(1), || ring.len() >= 3));
        session.stop();

        // Only the successful (odd) reads land, still in order.
        let tags: Vec<u8> = std::iter::from_fn(|| ring.try_pop())
            .map(|b| b.as_bytes()[0])
            .collect();
        assert!(tags.len() >= 3);
        assert!(tags.iter().all(|t| t % 2 == 1));
        assert!(tags.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_stop_stalls_on_blocked_read() {
        let (release_tx, release_rx) = mpsc::channel();
        let ring = BlockRing::with_capacity(4);
        let backend = Box::new(BlockingBackend { release: release_rx });
        let mut session = CaptureSession::new(backend, ring, 2);
        session.start();
        // Give the producer time to enter the blocking read.
        thread::sleep(Duration::from_millis(20));

        let (done_tx, done_rx) = mpsc::channel();
        let stopper = thread::spawn(move || {
            session.stop();
            let _ = done_tx.send(());
        });

        // stop() cannot finish while the read is stalled.
        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());

        // Releasing the read lets the loop observe the stop.
        release_tx.send(()).unwrap();
        assert!(done_rx.recv_timeout(Duration::from_secs(1)).is_ok());
        stopper.join().unwrap();
    }
}
