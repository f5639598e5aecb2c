//! Token-budgeted windowing of the conversation history.
//!
//! The window is the longest oldest-first prefix whose cumulative token cost
//! fits the budget. Walking stops at the first message that would overflow,
//! so a large early message hides everything after it. This keeps the start
//! of the conversation rather than the most recent turns.

use super::message::ChatMessage;
use crate::tokenizer::TokenEncoder;
use crate::utilities::iter::IteratorExt;

/// Token budget for prior history in one request.
pub const DEFAULT_HISTORY_TOKEN_BUDGET: usize = 2048;

/// Token cost of a message: zero when empty, else its encoded length.
pub fn message_cost(encoder: &dyn TokenEncoder, message: &ChatMessage) -> usize {
    if message.content.is_empty() {
        0
    } else {
        encoder.count_tokens(&message.content)
    }
}

/// Select the prefix of `messages` that fits in `budget` tokens.
pub fn window(encoder: &dyn TokenEncoder, messages: &[ChatMessage], budget: usize) -> Vec<ChatMessage> {
    let windowed: Vec<ChatMessage> = messages
        .iter()
        .take_while_aggregate(
            0usize,
            |cost, message| cost + message_cost(encoder, message),
            |cost| *cost <= budget,
        )
        .cloned()
        .collect();

    if windowed.len() < messages.len() {
        log::debug!(
            "History window kept {} of {} messages (budget {} tokens)",
            windowed.len(),
            messages.len(),
            budget
        );
    }
    windowed
}
