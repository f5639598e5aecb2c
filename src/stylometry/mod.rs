//! Stylometric logit-bias engine.
//!
//! ```text
//! document ──tagger──▶ FrequencyTable ──scorer──▶ Vec<LogitBias>   (trained)
//! vocabulary ─────────────────────────random────▶ Vec<LogitBias>   (baseline)
//! ```
//!
//! Both producers expand every word into all of its surface-form tokens
//! (see [`crate::tokenizer::variants`]) and emit at most one bias per token.

pub mod frequency;
pub mod lexicon_tagger;
pub mod pos;
pub mod random;
pub mod scorer;
pub mod vocabulary;

pub use frequency::{analyze, FrequencyTable, WordCounts};
pub use lexicon_tagger::LexiconTagger;
pub use pos::{PartOfSpeech, PosTagger, TaggedWord};
pub use vocabulary::{PartOfSpeechRecord, VocabularyTable};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tokenizer::Token;

/// A per-token adjustment of the backend's next-token score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogitBias {
    pub token: Token,
    pub bias: i32,
}

impl LogitBias {
    pub fn new(token: Token, bias: i32) -> Self {
        Self { token, bias }
    }
}

/// Collapse a bias list into a token → bias map. Later entries for the same
/// token do not override earlier ones.
pub fn to_bias_map(biases: &[LogitBias]) -> BTreeMap<Token, i32> {
    let mut map = BTreeMap::new();
    for entry in biases {
        map.entry(entry.token).or_insert(entry.bias);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logit_bias_json_shape() {
        let json = serde_json::to_string(&vec![LogitBias::new(13, 10), LogitBias::new(0, -3)]).unwrap();
        assert_eq!(json, r#"[{"token":13,"bias":10},{"token":0,"bias":-3}]"#);
    }

    #[test]
    fn test_to_bias_map_keeps_first() {
        let map = to_bias_map(&[LogitBias::new(5, 2), LogitBias::new(5, 9), LogitBias::new(1, 4)]);
        assert_eq!(map.len(), 2);
        assert_eq!(map[&5], 2);
    }
}
