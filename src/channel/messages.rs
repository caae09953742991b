use serde::{Deserialize, Serialize};

/// Message sent to the transcription channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// One capture slice, WAV bytes encoded as base64
    AudioChunk { data: String },
    /// Capture finished, flush any buffered audio server-side
    AudioEnd,
    /// Reset the server-side transcript for this session
    ClearTranscript,
}

/// Message received from the transcription channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Transcript {
        text: String,
        /// Full transcript resync: replaces the local transcript instead of appending
        #[serde(default)]
        is_historical: bool,
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        timestamp: Option<String>,
    },
    Error {
        message: String,
        #[serde(default)]
        details: Option<String>,
    },
    Warning {
        message: String,
    },
    TranscriptCleared,
    Pong {
        #[serde(default)]
        timestamp: Option<String>,
    },
}
