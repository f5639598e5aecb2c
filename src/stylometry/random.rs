//! Random logit biases over a reference vocabulary.
//!
//! A style-agnostic baseline persona that needs no training text.

use std::collections::HashSet;

use rand::Rng;

use super::vocabulary::VocabularyTable;
use super::LogitBias;
use crate::tokenizer::{expand_in_order, TokenEncoder};

/// Inclusive bias range of the random baseline.
pub const MIN_RANDOM_BIAS: i32 = -10;
pub const MAX_RANDOM_BIAS: i32 = 9;

/// Assign every token of every vocabulary word an independent uniform bias.
///
/// The first bias drawn for a token wins; the result is ordered by token,
/// descending.
pub fn generate<R: Rng + ?Sized>(
    encoder: &dyn TokenEncoder,
    vocabulary: &VocabularyTable,
    rng: &mut R,
) -> Vec<LogitBias> {
    let mut seen = HashSet::new();
    let mut biases = Vec::new();
    for record in vocabulary.records() {
        for token in expand_in_order(encoder, &record.value) {
            let bias = rng.gen_range(MIN_RANDOM_BIAS..=MAX_RANDOM_BIAS);
            if seen.insert(token) {
                biases.push(LogitBias::new(token, bias));
            }
        }
    }
    biases.sort_by(|a, b| b.token.cmp(&a.token));

    log::debug!(
        "Generated {} random logit biases from {} vocabulary records",
        biases.len(),
        vocabulary.len()
    );
    biases
}
