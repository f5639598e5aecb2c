//! Chat completion backends.
//!
//! | Backend | Module |
//! |---------|--------|
//! | OpenAI Chat Completions (SSE) | [`openai`] |
//! | Scripted replay | [`scripted`] |

pub mod openai;
pub mod scripted;

pub use openai::OpenAIChatCompletion;
pub use scripted::{RecordedRequest, ScriptStep, ScriptedChat};
