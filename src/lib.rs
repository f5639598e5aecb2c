//! # persona-chat
//!
//! Stylometric personas for a streaming chat backend.
//!
//! A persona is a fixed token logit-bias map, computed once at startup from
//! one of four strategies (no bias, punctuation, random baseline, or biases
//! learned from a training text by part-of-speech log-odds scoring). Every
//! chat turn then sends a token-budgeted window of the conversation with
//! those biases and streams the reply back token by token.
//!
//! - [`tokenizer`] - Subword encoder contract, `cl100k_base`, surface-form expansion
//! - [`stylometry`] - Part-of-speech analysis, log-odds scoring, random baseline
//! - [`persona`] - Persona modes and the settings factory
//! - [`chat`] - Messages, history windowing, cancellation, the turn orchestrator
//! - [`llms`] - Streaming backend contract and providers
//! - [`cli`] - Argument parsing and the interactive loop
//! - [`utilities`] - Configuration, errors, resources, iterator helpers

pub mod chat;
pub mod cli;
pub mod llms;
pub mod persona;
pub mod stylometry;
pub mod tokenizer;
pub mod utilities;

// Re-exports for convenience
pub use chat::{ChatMessage, ChatOrchestrator, ChatSettings};
pub use persona::PersonaMode;
pub use stylometry::LogitBias;
pub use tokenizer::{Token, TokenEncoder};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
