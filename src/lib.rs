pub mod api;
pub mod audio;
pub mod auth;
pub mod channel;
pub mod config;
pub mod session;

pub use api::{ApiClient, ApiError};
pub use audio::{AudioFrame, CaptureBackend, CaptureConfig, MicrophoneBackend, SliceConfig, SliceEncoder};
pub use auth::{AuthSession, CredentialStore};
pub use channel::{ChannelClient, ClientMessage, ServerMessage};
pub use config::Config;
pub use session::{ConnectionState, SessionConfig, SessionEvent, SessionState, TranscriptionSession};
