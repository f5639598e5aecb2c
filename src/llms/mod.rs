//! Completion backend layer.
//!
//! - [`streaming`] - The streaming backend contract and chunk plumbing
//! - [`providers`] - Backend implementations (OpenAI, scripted replay)

pub mod providers;
pub mod streaming;

// Re-exports for convenience
pub use providers::{OpenAIChatCompletion, ScriptStep, ScriptedChat};
pub use streaming::{StreamAccumulator, StreamChunk, StreamReceiver, StreamingChat};
