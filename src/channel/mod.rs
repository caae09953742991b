pub mod client;
pub mod messages;

pub use client::{ChannelClient, ChannelStream};
pub use messages::{ClientMessage, ServerMessage};
