//! Log-odds logit-bias scoring of a document's stylistic vocabulary.
//!
//! For a word `w` with count `c` in category `P` (category total `S_P`,
//! document total `N`):
//!
//! ```text
//! logOdds = ln(c / (N - c)) - ln(S_P / (N - S_P))
//! bias    = round_half_away(clamp(-logOdds, 0, 10))
//! ```
//!
//! Words that are rare relative to their category's baseline receive the
//! largest bias. Only function-like categories take part: nouns track topic
//! rather than style.

use std::collections::HashSet;

use super::frequency::FrequencyTable;
use super::pos::PartOfSpeech;
use super::LogitBias;
use crate::tokenizer::{expand_in_order, TokenEncoder};

/// Categories that are scored, in flattening order.
pub const SCORED_CATEGORIES: [PartOfSpeech; 5] = [
    PartOfSpeech::Adj,
    PartOfSpeech::Adv,
    PartOfSpeech::Pron,
    PartOfSpeech::Punct,
    PartOfSpeech::Verb,
];

/// Top (token, bias) pairs kept per category.
pub const PER_CATEGORY_LIMIT: usize = 10;

/// Upper bound on the emitted list.
pub const MAX_BIASES: usize = 50;

/// Inclusive bias range for scored words.
pub const MIN_SCORED_BIAS: i32 = 0;
pub const MAX_SCORED_BIAS: i32 = 10;

/// Log-odds of `count` within its category against the document baseline.
///
/// Returns `None` when either contrast mass is zero, i.e. the word or the
/// category covers the whole document.
pub fn log_odds(count: usize, category_sum: usize, total_word_count: usize) -> Option<f64> {
    let other_word_count = total_word_count.checked_sub(count)?;
    let other_category_count = total_word_count.checked_sub(category_sum)?;
    if count == 0 || other_word_count == 0 || other_category_count == 0 {
        return None;
    }
    let word_ratio = count as f64 / other_word_count as f64;
    let category_ratio = category_sum as f64 / other_category_count as f64;
    Some(word_ratio.ln() - category_ratio.ln())
}

/// Integer bias for a log-odds value: negated, clamped, rounded half away from zero.
pub fn bias_from_log_odds(log_odds: f64) -> i32 {
    // f64::round already rounds half away from zero.
    (-log_odds)
        .clamp(MIN_SCORED_BIAS as f64, MAX_SCORED_BIAS as f64)
        .round() as i32
}

/// Bias of one word, with degenerate statistics mapped to zero.
pub fn word_bias(count: usize, category_sum: usize, total_word_count: usize) -> i32 {
    match log_odds(count, category_sum, total_word_count) {
        Some(value) => bias_from_log_odds(value),
        None => {
            log::trace!(
                "Zero contrast mass (count={}, category={}, total={}); bias 0",
                count,
                category_sum,
                total_word_count
            );
            0
        }
    }
}

/// Top [`PER_CATEGORY_LIMIT`] (token, bias) pairs of one category.
///
/// Words are visited in document order and each word's tokens in
/// surface-form order. The sort is stable, so among equal biases the word
/// that appeared first in the document wins.
pub fn score_category(
    encoder: &dyn TokenEncoder,
    table: &FrequencyTable,
    pos: PartOfSpeech,
) -> Vec<LogitBias> {
    let Some(words) = table.words(pos) else {
        return Vec::new();
    };
    let category_sum = table.category_sum(pos);
    let total = table.total_word_count();

    let mut scored: Vec<LogitBias> = words
        .iter()
        .flat_map(|(word, count)| {
            let bias = word_bias(count, category_sum, total);
            expand_in_order(encoder, word)
                .into_iter()
                .map(move |token| LogitBias::new(token, bias))
        })
        .collect();

    scored.sort_by(|a, b| b.bias.cmp(&a.bias));
    scored.truncate(PER_CATEGORY_LIMIT);
    scored
}

/// Score a document's frequency table into at most [`MAX_BIASES`] biases.
///
/// Categories are flattened in [`SCORED_CATEGORIES`] order; the first bias
/// seen for a token wins. The result is ordered by token, descending.
pub fn score(encoder: &dyn TokenEncoder, table: &FrequencyTable) -> Vec<LogitBias> {
    let mut seen = HashSet::new();
    let mut biases: Vec<LogitBias> = SCORED_CATEGORIES
        .iter()
        .flat_map(|&pos| score_category(encoder, table, pos))
        .filter(|bias| seen.insert(bias.token))
        .collect();

    biases.sort_by(|a, b| b.token.cmp(&a.token));
    biases.truncate(MAX_BIASES);

    log::debug!(
        "Scored {} logit biases from {} words",
        biases.len(),
        table.total_word_count()
    );
    biases
}
