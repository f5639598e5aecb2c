//! A backend that replays scripted replies instead of calling a service.
//!
//! Every call is recorded so callers can check exactly which messages and
//! settings were sent. Used for offline runs (`--offline` echoes the user's
//! input back) and as the test double for the orchestrator and chat loop.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::chat::cancel::{self, CancelSignal};
use crate::chat::message::{ChatMessage, ChatMessageRole, ChatSettings};
use crate::llms::streaming::{ChannelStreamReceiver, StreamChunk, StreamReceiver, StreamingChat};
use crate::utilities::errors::BackendError;

/// One step of a scripted reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Emit a text delta.
    Token(String),
    /// Emit a stream error and stop.
    Fail(String),
    /// Refuse the call before streaming starts (only meaningful first).
    Reject { status: u16, body: String },
    /// Stop producing until cancelled.
    Stall,
    /// Close the stream without a completion marker.
    Truncate,
}

impl ScriptStep {
    pub fn token(text: impl Into<String>) -> Self {
        Self::Token(text.into())
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }
}

/// A request observed by [`ScriptedChat`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub messages: Vec<ChatMessage>,
    pub settings: ChatSettings,
}

#[derive(Debug)]
enum Replies {
    /// One script per call; the last one repeats once the rest are used.
    Scripts(VecDeque<Vec<ScriptStep>>),
    /// Reply with the last user message, one word per delta.
    Echo,
}

#[derive(Debug)]
pub struct ScriptedChat {
    replies: Mutex<Replies>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedChat {
    /// Replay `script` on every call.
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self::turns(vec![script])
    }

    /// Replay `scripts` one per call, repeating the last.
    pub fn turns(scripts: Vec<Vec<ScriptStep>>) -> Self {
        Self {
            replies: Mutex::new(Replies::Scripts(scripts.into())),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replay a plain token sequence that completes normally.
    pub fn tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(tokens.into_iter().map(ScriptStep::token).collect())
    }

    pub fn echo() -> Self {
        Self {
            replies: Mutex::new(Replies::Echo),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_script(&self, messages: &[ChatMessage]) -> Vec<ScriptStep> {
        let Ok(mut replies) = self.replies.lock() else {
            return vec![ScriptStep::fail("scripted backend poisoned")];
        };
        match &mut *replies {
            Replies::Scripts(scripts) if scripts.len() > 1 => scripts.pop_front().unwrap_or_default(),
            Replies::Scripts(scripts) => scripts.front().cloned().unwrap_or_default(),
            Replies::Echo => echo_script(messages),
        }
    }
}

fn echo_script(messages: &[ChatMessage]) -> Vec<ScriptStep> {
    let input = messages
        .iter()
        .rev()
        .find(|m| m.role == ChatMessageRole::User)
        .map(|m| m.content.as_str())
        .unwrap_or("");
    input
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            if i == 0 {
                ScriptStep::token(word)
            } else {
                ScriptStep::token(format!(" {}", word))
            }
        })
        .collect()
}

#[async_trait]
impl StreamingChat for ScriptedChat {
    async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        settings: &ChatSettings,
        cancel: Option<CancelSignal>,
    ) -> Result<Box<dyn StreamReceiver>, BackendError> {
        let script = self.next_script(&messages);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                messages,
                settings: settings.clone(),
            });
        }

        if let Some(ScriptStep::Reject { status, body }) = script.first() {
            return Err(BackendError::Status {
                status: *status,
                body: body.clone(),
            });
        }

        let (tx, rx) = ChannelStreamReceiver::pair(16);
        tokio::spawn(async move {
            for step in script {
                let chunk = match step {
                    ScriptStep::Token(text) => StreamChunk::TextDelta { text },
                    ScriptStep::Fail(message) => {
                        let _ = tx.send(StreamChunk::Error { message }).await;
                        return;
                    }
                    ScriptStep::Stall => {
                        cancel::cancelled(cancel.as_ref()).await;
                        return;
                    }
                    ScriptStep::Truncate => return,
                    ScriptStep::Reject { .. } => continue,
                };
                if tx.send(chunk).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(StreamChunk::Done { usage: None }).await;
        });
        Ok(Box::new(rx))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
