use anyhow::{Context, Result};
use futures::stream::{SplitSink, SplitStream};
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::info;

use super::messages::ClientMessage;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Receive half of the channel, consumed by the session's read loop
pub type ChannelStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Send half of the transcription channel.
///
/// One channel per session: the connection is bound to the session ID in
/// the URL path, so the server needs no addressing inside the messages.
pub struct ChannelClient {
    sink: Mutex<WsSink>,
    session_id: String,
}

impl ChannelClient {
    /// Open the channel for a session
    pub async fn connect(base_url: &str, session_id: &str) -> Result<(Self, ChannelStream)> {
        let url = format!("{}/{}", base_url.trim_end_matches('/'), session_id);

        info!("Connecting to transcription channel at {}", url);

        let (ws, _response) = connect_async(&url)
            .await
            .context("Failed to open transcription channel")?;

        info!("Transcription channel open (session: {})", session_id);

        let (sink, stream) = futures::StreamExt::split(ws);

        Ok((
            Self {
                sink: Mutex::new(sink),
                session_id: session_id.to_string(),
            },
            stream,
        ))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send one control message as JSON text
    pub async fn send(&self, message: &ClientMessage) -> Result<()> {
        let payload = serde_json::to_string(message)?;

        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(payload))
            .await
            .context("Failed to send channel message")
    }

    /// Close the channel. Errors are ignored: the peer may already be gone.
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        let _ = sink.send(Message::Close(None)).await;
        let _ = sink.close().await;
    }
}
