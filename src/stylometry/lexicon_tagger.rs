//! Dictionary-driven part-of-speech tagger.
//!
//! Tags words by looking them up in the categorized vocabulary, with simple
//! shape rules for everything the vocabulary does not cover. It is cheap,
//! deterministic and needs no model download.
//!
//! The shape rules only recognise punctuation, numbers and proper nouns;
//! any other unknown word is tagged `NOUN`. Adjectives, adverbs, pronouns
//! and verbs are therefore limited to vocabulary words. A statistical tagger
//! can be used instead through [`PosTagger`] and
//! [`analyze`](super::frequency::analyze).

use std::collections::HashMap;

use super::pos::{PartOfSpeech, PosTagger, TaggedWord};
use super::vocabulary::VocabularyTable;
use crate::utilities::errors::TaggerError;

/// Characters that close a sentence.
const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

/// A tagger backed by a word → category lexicon.
#[derive(Debug, Clone, Default)]
pub struct LexiconTagger {
    lexicon: HashMap<String, PartOfSpeech>,
}

impl LexiconTagger {
    pub fn new(lexicon: HashMap<String, PartOfSpeech>) -> Self {
        Self { lexicon }
    }

    /// Build the lexicon from a vocabulary table.
    pub fn from_vocabulary(vocabulary: &VocabularyTable) -> Self {
        Self::new(vocabulary.lexicon())
    }

    fn classify(&self, word: &str, sentence_initial: bool) -> PartOfSpeech {
        if let Some(&pos) = self.lexicon.get(&word.to_lowercase()) {
            return pos;
        }
        if word.chars().all(|c| !c.is_alphanumeric()) {
            return PartOfSpeech::Punct;
        }
        if word.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
            return PartOfSpeech::Num;
        }
        let capitalized = word.chars().next().is_some_and(char::is_uppercase);
        if capitalized && !sentence_initial {
            return PartOfSpeech::Propn;
        }
        PartOfSpeech::Noun
    }
}

/// Split text into sentences of word and punctuation pieces.
///
/// Letters, digits, apostrophes and inner hyphens make up words; every other
/// non-space character is its own piece. A sentence ends after `.`, `!` or `?`.
pub fn segment(text: &str) -> Vec<Vec<String>> {
    let mut sentences = Vec::new();
    let mut sentence: Vec<String> = Vec::new();
    let mut word = String::new();

    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        let joins_word = ch.is_alphanumeric()
            || ch == '\''
            || (ch == '-' && !word.is_empty() && chars.peek().is_some_and(|c| c.is_alphanumeric()));
        if joins_word {
            word.push(ch);
            continue;
        }
        if !word.is_empty() {
            sentence.push(std::mem::take(&mut word));
        }
        if ch.is_whitespace() {
            continue;
        }
        sentence.push(ch.to_string());
        let closes = SENTENCE_TERMINATORS.contains(&ch)
            && !chars.peek().is_some_and(|c| SENTENCE_TERMINATORS.contains(c));
        if closes {
            sentences.push(std::mem::take(&mut sentence));
        }
    }
    if !word.is_empty() {
        sentence.push(word);
    }
    if !sentence.is_empty() {
        sentences.push(sentence);
    }
    sentences
}

impl PosTagger for LexiconTagger {
    fn tag(&self, document: &str) -> Result<Vec<Vec<TaggedWord>>, TaggerError> {
        Ok(segment(document)
            .into_iter()
            .map(|sentence| {
                sentence
                    .into_iter()
                    .enumerate()
                    .map(|(i, piece)| {
                        let pos = self.classify(&piece, i == 0);
                        TaggedWord::new(piece, pos)
                    })
                    .collect()
            })
            .collect())
    }
}
