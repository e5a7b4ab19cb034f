//! Device capture using PipeWire
//!
//! Bridges a PipeWire capture stream to the blocking [`CaptureBackend`]
//! contract: the stream's event loop runs on its own thread and forwards raw
//! S16BE chunks over a channel, and `read` assembles exactly one block from
//! them, blocking while the device has nothing new.

use pipewire as pw;
use pw::spa;
use pw::spa::param::format::{MediaSubtype, MediaType};
use pw::spa::param::format_utils;
use pw::spa::pod::Pod;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use log::{info, warn};

use super::backend::{BackendError, CaptureBackend};
use super::block::SampleBlock;
use crate::config::Config;

enum StreamCommand {
    Terminate,
}

/// Capture backend reading from a PipeWire input stream.
pub struct DeviceBackend {
    chunks: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
    sender: Option<pw::channel::Sender<StreamCommand>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl DeviceBackend {
    /// Connect a capture stream for the configured device.
    ///
    /// Fails synchronously when the stream cannot be set up; later stream
    /// faults surface as read errors.
    pub fn open(config: &Config) -> Result<Self, BackendError> {
        let (chunk_tx, chunk_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let (sender, receiver) = pw::channel::channel::<StreamCommand>();

        let loop_config = config.clone();
        let loop_ready = ready_tx.clone();
        let handle = thread::spawn(move || {
            if let Err(e) = run_stream_loop(loop_config, chunk_tx, &loop_ready, receiver) {
                let _ = loop_ready.send(Err(e));
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                chunks: chunk_rx,
                pending: Vec::new(),
                sender: Some(sender),
                thread_handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(BackendError::Open(e))
            }
            Err(_) => {
                let _ = handle.join();
                Err(BackendError::Open("PipeWire loop exited during setup".to_string()))
            }
        }
    }
}

impl CaptureBackend for DeviceBackend {
    fn read(&mut self, block: &mut SampleBlock) -> Result<(), BackendError> {
        let wanted = block.len();
        while self.pending.len() < wanted {
            let chunk = self
                .chunks
                .recv()
                .map_err(|_| BackendError::Read("capture stream closed".to_string()))?;
            self.pending.extend_from_slice(&chunk);
        }
        block.as_mut_bytes().copy_from_slice(&self.pending[..wanted]);
        self.pending.drain(..wanted);
        Ok(())
    }
}

impl Drop for DeviceBackend {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(StreamCommand::Terminate);
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Run the PipeWire capture loop in a background thread
fn run_stream_loop(
    config: Config,
    chunks: mpsc::Sender<Vec<u8>>,
    ready: &mpsc::Sender<Result<(), String>>,
    receiver: pw::channel::Receiver<StreamCommand>,
) -> Result<(), String> {
    pw::init();

    let mainloop = pw::main_loop::MainLoopRc::new(None)
        .map_err(|e| format!("Failed to create PipeWire main loop: {}", e))?;

    let context = pw::context::ContextRc::new(&mainloop, None)
        .map_err(|e| format!("Failed to create PipeWire context: {}", e))?;

    let core = context
        .connect_rc(None)
        .map_err(|e| format!("Failed to connect to PipeWire: {}", e))?;

    // Set up channel receiver to stop the loop
    let mainloop_weak = mainloop.downgrade();
    let _receiver = receiver.attach(mainloop.loop_(), move |cmd| match cmd {
        StreamCommand::Terminate => {
            if let Some(mainloop) = mainloop_weak.upgrade() {
                mainloop.quit();
            }
        }
    });

    // User data for the stream callbacks
    struct UserData {
        format: spa::param::audio::AudioInfoRaw,
        chunks: mpsc::Sender<Vec<u8>>,
    }

    let user_data = UserData {
        format: Default::default(),
        chunks,
    };

    let mut props = pw::properties::properties! {
        *pw::keys::MEDIA_TYPE => "Audio",
        *pw::keys::MEDIA_CATEGORY => "Capture",
        *pw::keys::MEDIA_ROLE => "Music",
        *pw::keys::APP_NAME => "wavescope",
    };
    if let Some(device) = &config.device {
        props.insert(*pw::keys::TARGET_OBJECT, device.as_str());
    }

    let stream = pw::stream::StreamBox::new(&core, &config.stream_label, props)
        .map_err(|e| format!("Failed to create PipeWire stream: {}", e))?;

    let _listener = stream
        .add_local_listener_with_user_data(user_data)
        .param_changed(|_, user_data, id, param| {
            let Some(param) = param else { return };
            if id != spa::param::ParamType::Format.as_raw() {
                return;
            }

            let (media_type, media_subtype) = match format_utils::parse_format(param) {
                Ok(v) => v,
                Err(_) => return,
            };

            if media_type != MediaType::Audio || media_subtype != MediaSubtype::Raw {
                return;
            }

            if user_data.format.parse(param).is_ok() {
                info!(
                    "Capture stream negotiated: {} Hz, {} channel(s)",
                    user_data.format.rate(),
                    user_data.format.channels()
                );
            } else {
                warn!("Failed to parse negotiated audio format");
            }
        })
        .process(|stream, user_data| {
            let Some(mut buffer) = stream.dequeue_buffer() else {
                return;
            };

            let datas = buffer.datas_mut();
            if datas.is_empty() {
                return;
            }

            let data = &mut datas[0];
            let size = data.chunk().size() as usize;
            if let Some(raw) = data.data() {
                let valid = size.min(raw.len());
                if valid > 0 {
                    // Receiver gone means the backend is being dropped; the
                    // terminate command will land shortly.
                    let _ = user_data.chunks.send(raw[..valid].to_vec());
                }
            }
        })
        .register()
        .map_err(|e| format!("Failed to register stream listener: {}", e))?;

    // Request exactly the pipeline's wire format: S16 high-byte-first, mono,
    // at the configured rate.
    let mut audio_info = spa::param::audio::AudioInfoRaw::new();
    audio_info.set_format(spa::param::audio::AudioFormat::S16BE);
    audio_info.set_rate(config.sample_rate);
    audio_info.set_channels(1);

    let obj = spa::pod::Object {
        type_: spa::utils::SpaTypes::ObjectParamFormat.as_raw(),
        id: spa::param::ParamType::EnumFormat.as_raw(),
        properties: audio_info.into(),
    };

    let values: Vec<u8> = spa::pod::serialize::PodSerializer::serialize(
        std::io::Cursor::new(Vec::new()),
        &spa::pod::Value::Object(obj),
    )
    .map_err(|e| format!("Failed to serialize audio format: {:?}", e))?
    .0
    .into_inner();

    let mut params = [Pod::from_bytes(&values).unwrap()];

    // Connect the stream
    stream
        .connect(
            spa::utils::Direction::Input,
            None,
            pw::stream::StreamFlags::AUTOCONNECT
                | pw::stream::StreamFlags::MAP_BUFFERS
                | pw::stream::StreamFlags::RT_PROCESS,
            &mut params,
        )
        .map_err(|e| format!("Failed to connect stream: {}", e))?;

    let _ = ready.send(Ok(()));

    // Run until terminated
    mainloop.run();

    Ok(())
}
