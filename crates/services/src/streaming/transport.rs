//! Transport-level subscription to the per-session push channel.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::StreamError;

/// Raw frame payloads as delivered by the channel, in order. The stream
/// ends when the server closes the connection; a transport-level failure
/// surfaces as an `Err` item.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, StreamError>> + Send>>;

/// Seam over the push channel, so the controller can be exercised against
/// scripted streams in tests.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open the one-shot subscription for `session_id`.
    ///
    /// # Errors
    ///
    /// Returns `StreamError` when the subscription cannot be established.
    async fn subscribe(&self, session_id: &str) -> Result<FrameStream, StreamError>;
}

/// Server-sent-events transport over `GET stream/<session_id>`.
pub struct SseTransport {
    client: Client,
    base_url: String,
}

impl SseTransport {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl StreamTransport for SseTransport {
    async fn subscribe(&self, session_id: &str) -> Result<FrameStream, StreamError> {
        let url = format!(
            "{}/stream/{session_id}",
            self.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StreamError::HttpStatus(response.status()));
        }

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut events = EventBuffer::default();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        for payload in events.push(&chunk) {
                            if tx.send(Ok(payload)).await.is_err() {
                                // Subscriber went away; stop reading.
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(StreamError::Transport(e.to_string()))).await;
                        return;
                    }
                }
            }
            // Dropping the sender ends the stream.
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Incremental SSE parser: accumulates `data:` lines from arbitrarily
/// split byte chunks and emits one payload per blank-line event boundary.
///
/// Chunk boundaries fall anywhere, including inside a multi-byte UTF-8
/// sequence, so the buffer holds raw bytes and decodes per complete line.
#[derive(Default)]
struct EventBuffer {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl EventBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if !self.data.is_empty() {
                    out.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.data.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            }
            // Comment lines and other SSE fields are not used by the
            // backend and are dropped.
        }
        out
    }
}
