//! Conversation and request-settings models.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stylometry::{to_bias_map, LogitBias};
use crate::tokenizer::Token;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatMessageRole {
    User,
    Assistant,
}

impl ChatMessageRole {
    /// Wire name used by chat completion APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for ChatMessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of a conversation. Content may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatMessageRole,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatMessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatMessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatMessageRole::Assistant, content)
    }
}

/// Sampling settings of a persona, computed once and shared by every turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    pub temperature: f32,
    #[serde(rename = "logitBiases", default)]
    pub logit_biases: BTreeMap<Token, i32>,
}

impl ChatSettings {
    /// Settings without any bias.
    pub fn new(temperature: f32) -> Self {
        Self {
            temperature,
            logit_biases: BTreeMap::new(),
        }
    }

    /// Settings biased by `biases`; the first entry for a token wins.
    pub fn with_biases(temperature: f32, biases: &[LogitBias]) -> Self {
        Self {
            temperature,
            logit_biases: to_bias_map(biases),
        }
    }

    /// The bias map as an ordered `{token, bias}` list, highest token first.
    pub fn bias_list(&self) -> Vec<LogitBias> {
        self.logit_biases
            .iter()
            .rev()
            .map(|(&token, &bias)| LogitBias::new(token, bias))
            .collect()
    }
}
