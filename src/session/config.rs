use serde::{Deserialize, Serialize};

/// Configuration for a transcription session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Opaque session identifier, one per session instance
    pub session_id: String,

    /// Transcription channel base URL; the session ID is appended as the path
    pub channel_base_url: String,

    /// Sample rate of the encoded audio slices (16 kHz for the backend's STT)
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Duration of one audio slice before it is sent
    pub slice_duration_ms: u64,
}

impl SessionConfig {
    /// Generate a fresh session identity
    pub fn session_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: Self::session_id(),
            channel_base_url: "ws://localhost:8000/ws/transcribe".to_string(),
            sample_rate: 16000,
            channels: 1,
            slice_duration_ms: 1000,
        }
    }
}
