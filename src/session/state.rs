use tracing::{debug, warn};

use crate::channel::ServerMessage;

/// Connection state of the transcription channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
    Errored,
}

/// Everything that can happen to a session, from the channel or the capture
/// device, normalized into one event type so state transitions go through a
/// single dispatch point.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ChannelOpened,
    ChannelClosed,
    ChannelError(String),
    Message(ServerMessage),
}

/// Observable state of one transcription session
#[derive(Debug, Clone)]
pub struct SessionState {
    pub connection: ConnectionState,
    pub is_capturing: bool,
    pub transcript: String,
    pub last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            connection: ConnectionState::Idle,
            is_capturing: false,
            transcript: String::new(),
            last_error: None,
        }
    }
}

impl SessionState {
    /// Apply one event. Events are applied in delivery order; no reordering
    /// or deduplication happens here.
    pub fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ChannelOpened => {
                self.connection = ConnectionState::Open;
                self.last_error = None;
            }
            SessionEvent::ChannelClosed => {
                if matches!(
                    self.connection,
                    ConnectionState::Open | ConnectionState::Connecting
                ) {
                    self.connection = ConnectionState::Closed;
                }
            }
            SessionEvent::ChannelError(message) => {
                self.connection = ConnectionState::Errored;
                self.last_error = Some(message);
            }
            SessionEvent::Message(message) => self.apply_message(message),
        }
    }

    fn apply_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Transcript {
                text,
                is_historical,
                ..
            } => {
                if is_historical {
                    // Resync from the server: overwrite, don't append
                    self.transcript = text;
                } else {
                    self.transcript.push(' ');
                    self.transcript.push_str(&text);
                }
            }
            ServerMessage::Error { message, details } => {
                if let Some(details) = details {
                    debug!("Channel error details: {}", details);
                }
                // Server-side failure, connection stays as-is
                self.last_error = Some(message);
            }
            ServerMessage::Warning { message } => {
                warn!("Transcription service warning: {}", message);
            }
            ServerMessage::TranscriptCleared => {
                debug!("Server acknowledged transcript clear");
            }
            ServerMessage::Pong { .. } => {}
        }
    }

    /// Reset to the initial state. Used by session teardown.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
