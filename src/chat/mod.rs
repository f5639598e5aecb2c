//! Conversation handling: message models, history windowing, cancellation
//! and the per-turn streaming orchestrator.
//!
//! ```text
//! history + input
//!   → window (oldest-first prefix within the token budget)
//!   → backend.stream(messages, persona settings)
//!   → producer ──unbounded FIFO──▶ consumer → on_token
//!   → full reply
//! ```

pub mod cancel;
pub mod history;
pub mod message;
pub mod orchestrator;

pub use cancel::CancelSignal;
pub use history::{window, DEFAULT_HISTORY_TOKEN_BUDGET};
pub use message::{ChatMessage, ChatMessageRole, ChatSettings};
pub use orchestrator::{ChatOrchestrator, TurnState};
