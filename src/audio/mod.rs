pub mod backend;
pub mod slice;

pub use backend::{AudioFrame, CaptureBackend, CaptureConfig, MicrophoneBackend};
pub use slice::{SliceConfig, SliceEncoder};
