//! Streaming chat backend contract.
//!
//! # Design
//!
//! - A backend call returns a [`StreamReceiver`] that yields [`StreamChunk`]s:
//!   text deltas, then exactly one `Done` or `Error`.
//! - Providers push chunks from a background task through a bounded tokio
//!   channel ([`ChannelStreamReceiver`]); the receiver side is lazy, finite
//!   and non-restartable.
//! - Cancellation is passed to the provider so that its background task
//!   stops reading from the network.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chat::cancel::CancelSignal;
use crate::chat::message::{ChatMessage, ChatSettings};
use crate::utilities::errors::BackendError;

// ---------------------------------------------------------------------------
// StreamChunk
// ---------------------------------------------------------------------------

/// A single chunk from a streaming chat response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// A text delta (one generated token or a few).
    TextDelta {
        /// The text fragment.
        text: String,
    },

    /// The stream finished normally.
    Done {
        /// Usage information, when the backend reports it.
        usage: Option<StreamUsage>,
    },

    /// The stream failed; no further chunks follow.
    Error {
        /// Error message.
        message: String,
    },
}

/// Token usage from a streaming response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

// ---------------------------------------------------------------------------
// StreamingChat trait
// ---------------------------------------------------------------------------

/// A chat completion backend that streams its reply.
///
/// # Example
///
/// ```ignore
/// let mut rx = backend.stream(messages, &settings, None).await?;
/// while let Some(chunk) = rx.next().await {
///     // ...
/// }
/// ```
#[async_trait]
pub trait StreamingChat: Send + Sync {
    /// Start a streaming call for `messages` with the persona's `settings`.
    ///
    /// Errors raised before the first chunk (connection, authentication,
    /// exhausted retries) are returned here; later failures arrive as
    /// [`StreamChunk::Error`].
    async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        settings: &ChatSettings,
        cancel: Option<CancelSignal>,
    ) -> Result<Box<dyn StreamReceiver>, BackendError>;

    /// Model identifier, for logs.
    fn model(&self) -> &str;
}

/// Receiver for streaming chunks.
///
/// Abstracts over the underlying transport (SSE, scripted replay, ...).
#[async_trait]
pub trait StreamReceiver: Send {
    /// Get the next chunk from the stream.
    ///
    /// Returns `None` once the stream is exhausted (after `Done` or `Error`).
    async fn next(&mut self) -> Option<StreamChunk>;
}

// ---------------------------------------------------------------------------
// ChannelStreamReceiver: wraps a tokio channel
// ---------------------------------------------------------------------------

/// A `StreamReceiver` backed by a tokio mpsc channel.
///
/// This is the default implementation used by providers that push chunks
/// via a background task.
pub struct ChannelStreamReceiver {
    rx: tokio::sync::mpsc::Receiver<StreamChunk>,
}

impl ChannelStreamReceiver {
    /// Create a matched pair of sender + receiver.
    pub fn pair(buffer: usize) -> (tokio::sync::mpsc::Sender<StreamChunk>, Self) {
        let (tx, rx) = tokio::sync::mpsc::channel(buffer);
        (tx, Self { rx })
    }
}

#[async_trait]
impl StreamReceiver for ChannelStreamReceiver {
    async fn next(&mut self) -> Option<StreamChunk> {
        self.rx.recv().await
    }
}

// ---------------------------------------------------------------------------
// StreamAccumulator: assemble a full reply from chunks
// ---------------------------------------------------------------------------

/// Accumulates streaming chunks into a complete reply.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    usage: Option<StreamUsage>,
}

impl StreamAccumulator {
    /// Create a new empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a chunk, returning `true` if the stream is done.
    pub fn push(&mut self, chunk: &StreamChunk) -> bool {
        match chunk {
            StreamChunk::TextDelta { text } => {
                self.text.push_str(text);
                false
            }
            StreamChunk::Done { usage } => {
                self.usage = usage.clone();
                true
            }
            StreamChunk::Error { .. } => true,
        }
    }

    /// Consume the accumulator, returning the text.
    pub fn into_text(self) -> String {
        self.text
    }

    /// Get the usage info.
    pub fn usage(&self) -> Option<&StreamUsage> {
        self.usage.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
