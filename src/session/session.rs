use anyhow::Result;
use futures::stream::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::state::{ConnectionState, SessionEvent, SessionState};
use crate::audio::{
    AudioFrame, CaptureBackend, CaptureConfig, MicrophoneBackend, SliceConfig, SliceEncoder,
};
use crate::channel::{ChannelClient, ChannelStream, ClientMessage, ServerMessage};

type SharedState = Arc<Mutex<SessionState>>;
type SharedChannel = Arc<Mutex<Option<Arc<ChannelClient>>>>;

/// A transcription session: one capture device, one streaming channel, one
/// cumulative transcript.
///
/// The session mediates between the microphone and the remote transcription
/// service. Capture slices are encoded and sent while the channel is open;
/// slices produced while it is not are dropped without protest. Teardown via
/// [`disconnect`](Self::disconnect) is idempotent and is the only
/// cancellation primitive.
pub struct TranscriptionSession {
    config: SessionConfig,

    /// Observable session state, mutated only through event dispatch
    state: SharedState,

    /// Send half of the channel, present between connect and disconnect
    channel: SharedChannel,

    /// Handle for the channel read loop
    reader_task: Mutex<Option<JoinHandle<()>>>,

    /// Handle for the capture/encode/send loop
    capture_task: Mutex<Option<JoinHandle<()>>>,

    /// Capture backend, held so stop can release the device
    backend: Mutex<Option<Box<dyn CaptureBackend>>>,

    /// Whether capture is currently active
    is_capturing: Arc<AtomicBool>,
}

impl TranscriptionSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(SessionState::default())),
            channel: Arc::new(Mutex::new(None)),
            reader_task: Mutex::new(None),
            capture_task: Mutex::new(None),
            backend: Mutex::new(None),
            is_capturing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Snapshot of the current session state
    pub async fn state(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    pub async fn transcript(&self) -> String {
        self.state.lock().await.transcript.clone()
    }

    pub async fn connection(&self) -> ConnectionState {
        self.state.lock().await.connection
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.last_error.clone()
    }

    pub fn is_capturing(&self) -> bool {
        self.is_capturing.load(Ordering::SeqCst)
    }

    /// Apply one session event. The channel read loop feeds this; tests can
    /// drive the full state machine through it without a live socket.
    pub async fn handle_event(&self, event: SessionEvent) {
        Self::dispatch(&self.state, event).await;
    }

    /// Open the channel for this session.
    ///
    /// A connection failure does not return an error: the session moves to
    /// the errored state with a user-facing message and can be torn down
    /// with [`disconnect`](Self::disconnect). No automatic retry.
    pub async fn connect(&self) {
        {
            let channel = self.channel.lock().await;
            if channel.is_some() {
                warn!("Session {} already has a channel", self.config.session_id);
                return;
            }
        }

        {
            let mut state = self.state.lock().await;
            state.connection = ConnectionState::Connecting;
        }

        match ChannelClient::connect(&self.config.channel_base_url, &self.config.session_id).await
        {
            Ok((client, stream)) => {
                {
                    let mut channel = self.channel.lock().await;
                    *channel = Some(Arc::new(client));
                }

                Self::dispatch(&self.state, SessionEvent::ChannelOpened).await;

                let state = Arc::clone(&self.state);
                let reader = tokio::spawn(Self::read_loop(stream, state));

                let mut handle = self.reader_task.lock().await;
                *handle = Some(reader);
            }
            Err(e) => {
                warn!("Channel connect failed: {:#}", e);
                Self::dispatch(
                    &self.state,
                    SessionEvent::ChannelError(
                        "Failed to connect to transcription service".to_string(),
                    ),
                )
                .await;
            }
        }
    }

    /// Start microphone capture. No-op if capture is already running.
    ///
    /// On device failure the error is recorded as `last_error` and returned;
    /// connection state and transcript are untouched.
    pub async fn start_capture(&self) -> Result<()> {
        let backend = MicrophoneBackend::new(CaptureConfig {
            target_sample_rate: self.config.sample_rate,
            target_channels: self.config.channels,
            buffer_duration_ms: 100,
        });
        self.start_capture_with(Box::new(backend)).await
    }

    /// Start capture with an explicit backend. Used directly by tests.
    pub async fn start_capture_with(&self, mut backend: Box<dyn CaptureBackend>) -> Result<()> {
        if self.is_capturing.swap(true, Ordering::SeqCst) {
            debug!("Capture already active, ignoring start");
            return Ok(());
        }

        info!(
            "Starting capture for session {} ({})",
            self.config.session_id,
            backend.name()
        );

        let frame_rx = match backend.start().await {
            Ok(rx) => rx,
            Err(e) => {
                self.is_capturing.store(false, Ordering::SeqCst);
                let message = "Microphone access denied or not available";
                {
                    let mut state = self.state.lock().await;
                    state.last_error = Some(message.to_string());
                }
                return Err(e.context(message));
            }
        };

        {
            let mut state = self.state.lock().await;
            state.is_capturing = true;
        }
        {
            let mut held = self.backend.lock().await;
            *held = Some(backend);
        }

        let encoder = SliceEncoder::new(SliceConfig {
            sample_rate: self.config.sample_rate,
            channels: self.config.channels,
            slice_duration_ms: self.config.slice_duration_ms,
        });

        let task = tokio::spawn(Self::capture_loop(
            frame_rx,
            encoder,
            Arc::clone(&self.channel),
            Arc::clone(&self.state),
            Arc::clone(&self.is_capturing),
        ));

        let mut handle = self.capture_task.lock().await;
        *handle = Some(task);

        Ok(())
    }

    /// Stop capture and release the device. No-op if capture is not active.
    /// Sends one `audio_end` if a channel exists; does not close the channel.
    pub async fn stop_capture(&self) {
        if !self.is_capturing.swap(false, Ordering::SeqCst) {
            debug!("Capture not active, ignoring stop");
            return;
        }

        info!("Stopping capture for session {}", self.config.session_id);

        {
            let mut held = self.backend.lock().await;
            if let Some(mut backend) = held.take() {
                if let Err(e) = backend.stop().await {
                    warn!("Failed to stop capture backend: {:#}", e);
                }
            }
        }

        // The capture task drains remaining frames, flushes the partial
        // slice, and sends audio_end before exiting
        {
            let mut handle = self.capture_task.lock().await;
            if let Some(task) = handle.take() {
                if let Err(e) = task.await {
                    error!("Capture task panicked: {}", e);
                }
            }
        }

        let mut state = self.state.lock().await;
        state.is_capturing = false;
    }

    /// Reset the transcript locally and ask the server to do the same.
    ///
    /// The local reset is immediate; the control message is best-effort and
    /// not awaited for acknowledgment.
    pub async fn clear_transcript(&self) {
        {
            let mut state = self.state.lock().await;
            state.transcript.clear();
        }

        let client = self.channel.lock().await.clone();
        if let Some(client) = client {
            if let Err(e) = client.send(&ClientMessage::ClearTranscript).await {
                warn!("clear_transcript send failed: {:#}", e);
            }
        }
    }

    /// Tear the session down: stop capture, close the channel, reset all
    /// local state. Idempotent; pending sends that complete afterwards are
    /// ignored rather than errors.
    pub async fn disconnect(&self) {
        self.stop_capture().await;

        {
            let mut channel = self.channel.lock().await;
            if let Some(client) = channel.take() {
                client.close().await;
            }
        }

        {
            let mut handle = self.reader_task.lock().await;
            if let Some(task) = handle.take() {
                task.abort();
                let _ = task.await;
            }
        }

        let mut state = self.state.lock().await;
        state.reset();

        info!("Session {} disconnected", self.config.session_id);
    }

    async fn dispatch(state: &SharedState, event: SessionEvent) {
        let mut state = state.lock().await;
        state.apply(event);
    }

    /// Channel read loop: parse inbound frames and apply them in delivery
    /// order. Unparseable payloads are discarded and logged.
    async fn read_loop(mut stream: ChannelStream, state: SharedState) {
        while let Some(item) = stream.next().await {
            match item {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(message) => {
                        Self::dispatch(&state, SessionEvent::Message(message)).await;
                    }
                    Err(e) => {
                        warn!("Discarding unparseable channel message: {}", e);
                    }
                },
                Ok(Message::Close(_)) => {
                    Self::dispatch(&state, SessionEvent::ChannelClosed).await;
                    break;
                }
                Ok(_) => {
                    // Binary and ping/pong frames are not part of the protocol
                }
                Err(e) => {
                    Self::dispatch(&state, SessionEvent::ChannelError(e.to_string())).await;
                    break;
                }
            }
        }

        // Stream exhausted without a close frame counts as a close
        Self::dispatch(&state, SessionEvent::ChannelClosed).await;

        debug!("Channel read loop finished");
    }

    /// Capture loop: accumulate frames into slices, encode, and send each
    /// slice while the channel is open. On shutdown, flush the partial slice
    /// and signal end of audio.
    async fn capture_loop(
        mut frame_rx: mpsc::Receiver<AudioFrame>,
        mut encoder: SliceEncoder,
        channel: SharedChannel,
        state: SharedState,
        is_capturing: Arc<AtomicBool>,
    ) {
        debug!("Capture loop started");

        while let Some(frame) = frame_rx.recv().await {
            if !is_capturing.load(Ordering::SeqCst) {
                break;
            }

            if let Some(slice) = encoder.push(frame) {
                Self::send_slice(&channel, &state, slice).await;
            }
        }

        if let Some(slice) = encoder.flush() {
            Self::send_slice(&channel, &state, slice).await;
        }

        // End-of-audio marker, best-effort if a channel exists
        let client = channel.lock().await.clone();
        if let Some(client) = client {
            if let Err(e) = client.send(&ClientMessage::AudioEnd).await {
                warn!("audio_end send failed: {:#}", e);
            }
        }

        debug!("Capture loop finished");
    }

    /// Send one encoded slice, but only while the channel is open. A slice
    /// produced while the channel is connecting, closed, or errored is
    /// dropped silently: no buffering, no retry, no error surfaced.
    async fn send_slice(channel: &SharedChannel, state: &SharedState, data: String) {
        let open = { state.lock().await.connection == ConnectionState::Open };
        if !open {
            debug!("Channel not open, dropping audio slice");
            return;
        }

        let client = channel.lock().await.clone();
        let Some(client) = client else {
            debug!("No channel, dropping audio slice");
            return;
        };

        if let Err(e) = client.send(&ClientMessage::AudioChunk { data }).await {
            // Same policy as a closed channel: the slice is lost
            debug!("Audio slice send failed: {:#}", e);
        }
    }
}
