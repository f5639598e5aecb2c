//! One chat turn: window the history, open the backend stream, and fan the
//! reply out to a callback while accumulating it.
//!
//! # Design
//!
//! - The backend is opened first (`Requesting`); the turn then runs two
//!   units joined with `tokio::join!`: a producer draining the backend
//!   stream and a consumer invoking the callback, connected by an unbounded
//!   FIFO channel.
//! - The producer owns the sender; dropping it when the backend finishes (or
//!   fails) is what ends the consumer loop.
//! - The producer accumulates the reply; the consumer only delivers. A turn
//!   whose backend completed returns the whole reply even if cancellation
//!   landed while tokens were still queued for the callback.
//! - Cancellation stops both units. Tokens already handed to the callback
//!   stay delivered; tokens still queued are discarded.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::cancel::{self, CancelSignal};
use super::history::{self, DEFAULT_HISTORY_TOKEN_BUDGET};
use super::message::{ChatMessage, ChatSettings};
use crate::llms::streaming::{StreamAccumulator, StreamChunk, StreamReceiver, StreamingChat};
use crate::tokenizer::TokenEncoder;
use crate::utilities::errors::{BackendError, ChatError};

/// Lifecycle of a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Windowing,
    Requesting,
    Streaming,
    Completed,
    Failed,
}

fn transition(state: &mut TurnState, next: TurnState) {
    log::debug!("Chat turn {:?} -> {:?}", state, next);
    *state = next;
}

/// Drives chat turns against a streaming backend with a fixed persona.
pub struct ChatOrchestrator {
    backend: Arc<dyn StreamingChat>,
    encoder: Arc<dyn TokenEncoder>,
    settings: Arc<ChatSettings>,
    history_budget: usize,
}

impl ChatOrchestrator {
    pub fn new(
        backend: Arc<dyn StreamingChat>,
        encoder: Arc<dyn TokenEncoder>,
        settings: Arc<ChatSettings>,
    ) -> Self {
        Self {
            backend,
            encoder,
            settings,
            history_budget: DEFAULT_HISTORY_TOKEN_BUDGET,
        }
    }

    pub fn with_history_budget(mut self, budget: usize) -> Self {
        self.history_budget = budget;
        self
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Messages sent for `input`: the windowed history followed by the new
    /// user message.
    pub fn prepare(&self, history: &[ChatMessage], input: &str) -> Vec<ChatMessage> {
        let mut messages = history::window(self.encoder.as_ref(), history, self.history_budget);
        messages.push(ChatMessage::user(input));
        messages
    }

    /// Run one turn, calling `on_token` for every generated token in order.
    ///
    /// Returns the full reply. On failure or cancellation the tokens already
    /// passed to `on_token` are not retracted.
    pub async fn chat<F>(
        &self,
        history: &[ChatMessage],
        input: &str,
        on_token: F,
        cancel: Option<&CancelSignal>,
    ) -> Result<String, ChatError>
    where
        F: FnMut(&str) + Send,
    {
        let mut state = TurnState::Idle;

        transition(&mut state, TurnState::Windowing);
        let messages = self.prepare(history, input);

        transition(&mut state, TurnState::Requesting);
        let opened = tokio::select! {
            biased;
            _ = cancel::cancelled(cancel) => Err(ChatError::Cancelled),
            opened = self.backend.stream(messages, &self.settings, cancel.cloned()) => {
                opened.map_err(ChatError::from)
            }
        };
        let stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                transition(&mut state, TurnState::Failed);
                return Err(e);
            }
        };

        transition(&mut state, TurnState::Streaming);
        let (tx, rx) = mpsc::unbounded_channel();
        let (produced, delivered) = tokio::join!(
            produce(stream, tx, cancel),
            consume(rx, on_token, cancel)
        );

        match produced {
            Ok(accumulator) => {
                transition(&mut state, TurnState::Completed);
                if let Some(usage) = accumulator.usage() {
                    log::debug!(
                        "Chat turn usage: prompt={}, completion={}, total={}",
                        usage.prompt_tokens,
                        usage.completion_tokens,
                        usage.total_tokens
                    );
                }
                Ok(accumulator.into_text())
            }
            Err(e) => {
                transition(&mut state, TurnState::Failed);
                log::debug!("Chat turn failed after {} delivered tokens: {}", delivered, e);
                Err(e)
            }
        }
    }
}

/// Drain the backend until it completes, fails or the turn is cancelled,
/// accumulating the reply and queueing each text delta for the consumer.
/// Consumes `tx` so the consumer sees the channel close.
async fn produce(
    mut stream: Box<dyn StreamReceiver>,
    tx: mpsc::UnboundedSender<String>,
    cancel: Option<&CancelSignal>,
) -> Result<StreamAccumulator, ChatError> {
    let mut accumulator = StreamAccumulator::new();
    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel::cancelled(cancel) => return Err(ChatError::Cancelled),
            chunk = stream.next() => chunk,
        };
        let chunk = match chunk {
            Some(StreamChunk::Error { message }) => {
                return Err(BackendError::Stream(message).into());
            }
            Some(chunk) => chunk,
            None => return Err(ChatError::UnexpectedEnd),
        };
        if accumulator.push(&chunk) {
            return Ok(accumulator);
        }
        if let StreamChunk::TextDelta { text } = chunk {
            log::trace!("Chat turn token: {:?}", text);
            // A closed queue means the consumer stopped on cancellation.
            if tx.send(text).is_err() {
                return Err(ChatError::Cancelled);
            }
        }
    }
}

/// Hand queued tokens to `on_token` until the channel closes or the turn
/// is cancelled. Returns how many were delivered.
async fn consume<F>(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut on_token: F,
    cancel: Option<&CancelSignal>,
) -> usize
where
    F: FnMut(&str),
{
    let mut delivered = 0;
    loop {
        let token = tokio::select! {
            biased;
            _ = cancel::cancelled(cancel) => break,
            token = rx.recv() => token,
        };
        let Some(token) = token else { break };
        on_token(&token);
        delivered += 1;
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llms::providers::scripted::{ScriptStep, ScriptedChat};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use crate::stylometry::LogitBias;
    use crate::tokenizer::testing::InternEncoder;

    fn orchestrator(backend: Arc<ScriptedChat>, settings: ChatSettings) -> ChatOrchestrator {
        ChatOrchestrator::new(backend, Arc::new(InternEncoder::new()), Arc::new(settings))
    }

    #[tokio::test]
    async fn test_tokens_forwarded_in_order() {
        let backend = Arc::new(ScriptedChat::tokens(["Hel", "lo"]));
        let chat = orchestrator(backend, ChatSettings::new(0.0));

        let mut seen = Vec::new();
        let reply = chat
            .chat(&[], "hi", |t| seen.push(t.to_string()), None)
            .await
            .unwrap();

        assert_eq!(seen, vec!["Hel", "lo"]);
        assert_eq!(reply, "Hello");
    }

    #[tokio::test]
    async fn test_mid_stream_error_after_one_token() {
        let backend = Arc::new(ScriptedChat::new(vec![
            ScriptStep::token("Hel"),
            ScriptStep::fail("connection reset"),
        ]));
        let chat = orchestrator(backend, ChatSettings::new(0.0));

        let mut seen = Vec::new();
        let err = chat
            .chat(&[], "hi", |t| seen.push(t.to_string()), None)
            .await
            .unwrap_err();

        assert_eq!(seen, vec!["Hel"]);
        assert!(matches!(err, ChatError::Backend(BackendError::Stream(ref m)) if m == "connection reset"));
    }

    #[tokio::test]
    async fn test_request_rejected() {
        let backend = Arc::new(ScriptedChat::new(vec![ScriptStep::Reject {
            status: 401,
            body: "bad key".into(),
        }]));
        let chat = orchestrator(backend, ChatSettings::new(0.0));

        let mut calls = 0;
        let err = chat.chat(&[], "hi", |_| calls += 1, None).await.unwrap_err();
        assert_eq!(calls, 0);
        assert!(matches!(err, ChatError::Backend(BackendError::Status { status: 401, .. })));
    }

    #[tokio::test]
    async fn test_stream_without_completion() {
        let backend = Arc::new(ScriptedChat::new(vec![
            ScriptStep::token("a"),
            ScriptStep::Truncate,
        ]));
        let chat = orchestrator(backend, ChatSettings::new(0.0));
        let err = chat.chat(&[], "hi", |_| {}, None).await.unwrap_err();
        assert!(matches!(err, ChatError::UnexpectedEnd));
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_keeps_delivered_tokens() {
        let backend = Arc::new(ScriptedChat::new(vec![
            ScriptStep::token("partial"),
            ScriptStep::Stall,
        ]));
        let chat = orchestrator(backend, ChatSettings::new(0.0));
        let signal = CancelSignal::new();

        let mut seen = Vec::new();
        let trigger = signal.clone();
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            chat.chat(
                &[],
                "hi",
                |t| {
                    seen.push(t.to_string());
                    trigger.cancel();
                },
                Some(&signal),
            ),
        )
        .await
        .expect("cancellation must end the turn");

        assert!(matches!(result, Err(ChatError::Cancelled)));
        assert_eq!(seen, vec!["partial"]);
    }

    #[tokio::test]
    async fn test_cancel_before_request() {
        let backend = Arc::new(ScriptedChat::tokens(["never"]));
        let chat = orchestrator(backend.clone(), ChatSettings::new(0.0));
        let signal = CancelSignal::new();
        signal.cancel();

        let mut calls = 0;
        let result = chat.chat(&[], "hi", |_| calls += 1, Some(&signal)).await;
        assert!(matches!(result, Err(ChatError::Cancelled)));
        assert_eq!(calls, 0);
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_windowed_history_and_settings_reach_backend() {
        let backend = Arc::new(ScriptedChat::tokens(["ok"]));
        let settings = ChatSettings::with_biases(0.7, &[LogitBias::new(13, 10)]);
        let chat = orchestrator(backend.clone(), settings.clone()).with_history_budget(3);

        let history = vec![
            ChatMessage::user("one two"),
            ChatMessage::assistant("three four"),
            ChatMessage::user("five"),
        ];
        chat.chat(&history, "next", |_| {}, None).await.unwrap();

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].messages,
            vec![ChatMessage::user("one two"), ChatMessage::user("next")]
        );
        assert_eq!(requests[0].settings, settings);
    }

    /// Receiver that hands out every chunk without ever suspending.
    struct ReadyReceiver(VecDeque<StreamChunk>);

    #[async_trait]
    impl StreamReceiver for ReadyReceiver {
        async fn next(&mut self) -> Option<StreamChunk> {
            self.0.pop_front()
        }
    }

    struct ReadyChat(Vec<StreamChunk>);

    #[async_trait]
    impl StreamingChat for ReadyChat {
        async fn stream(
            &self,
            _messages: Vec<ChatMessage>,
            _settings: &ChatSettings,
            _cancel: Option<CancelSignal>,
        ) -> Result<Box<dyn StreamReceiver>, BackendError> {
            Ok(Box::new(ReadyReceiver(self.0.clone().into())))
        }

        fn model(&self) -> &str {
            "ready"
        }
    }

    #[tokio::test]
    async fn test_completed_turn_returns_whole_reply_despite_late_cancel() {
        let mut chunks: Vec<_> = (0..5)
            .map(|i| StreamChunk::TextDelta { text: format!("t{}", i) })
            .collect();
        chunks.push(StreamChunk::Done { usage: None });
        let chat = ChatOrchestrator::new(
            Arc::new(ReadyChat(chunks)),
            Arc::new(InternEncoder::new()),
            Arc::new(ChatSettings::new(0.0)),
        );
        let signal = CancelSignal::new();

        let mut seen = Vec::new();
        let trigger = signal.clone();
        let result = chat
            .chat(
                &[],
                "hi",
                |t| {
                    seen.push(t.to_string());
                    trigger.cancel();
                },
                Some(&signal),
            )
            .await;

        assert_eq!(result.unwrap(), "t0t1t2t3t4");
        assert_eq!(seen, vec!["t0"]);
    }
}
