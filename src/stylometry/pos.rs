//! Part-of-speech tags and the tagger contract.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utilities::errors::TaggerError;

/// Universal part-of-speech categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PartOfSpeech {
    Adj,
    Adp,
    Adv,
    Aux,
    Cconj,
    Det,
    Intj,
    Noun,
    Num,
    Part,
    Pron,
    Propn,
    Punct,
    Sconj,
    Sym,
    Verb,
    X,
}

impl PartOfSpeech {
    /// Every category, in declaration order.
    pub const ALL: [PartOfSpeech; 17] = [
        Self::Adj,
        Self::Adp,
        Self::Adv,
        Self::Aux,
        Self::Cconj,
        Self::Det,
        Self::Intj,
        Self::Noun,
        Self::Num,
        Self::Part,
        Self::Pron,
        Self::Propn,
        Self::Punct,
        Self::Sconj,
        Self::Sym,
        Self::Verb,
        Self::X,
    ];

    /// Short universal tag, e.g. `ADJ`.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Adj => "ADJ",
            Self::Adp => "ADP",
            Self::Adv => "ADV",
            Self::Aux => "AUX",
            Self::Cconj => "CCONJ",
            Self::Det => "DET",
            Self::Intj => "INTJ",
            Self::Noun => "NOUN",
            Self::Num => "NUM",
            Self::Part => "PART",
            Self::Pron => "PRON",
            Self::Propn => "PROPN",
            Self::Punct => "PUNCT",
            Self::Sconj => "SCONJ",
            Self::Sym => "SYM",
            Self::Verb => "VERB",
            Self::X => "X",
        }
    }

    fn long_name(&self) -> &'static str {
        match self {
            Self::Adj => "adjective",
            Self::Adp => "adposition",
            Self::Adv => "adverb",
            Self::Aux => "auxiliary",
            Self::Cconj => "coordinating conjunction",
            Self::Det => "determiner",
            Self::Intj => "interjection",
            Self::Noun => "noun",
            Self::Num => "numeral",
            Self::Part => "particle",
            Self::Pron => "pronoun",
            Self::Propn => "proper noun",
            Self::Punct => "punctuation",
            Self::Sconj => "subordinating conjunction",
            Self::Sym => "symbol",
            Self::Verb => "verb",
            Self::X => "other",
        }
    }
}

impl fmt::Display for PartOfSpeech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for PartOfSpeech {
    type Err = String;

    /// Accepts the short tag or the long English name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|pos| {
                pos.tag().eq_ignore_ascii_case(wanted) || pos.long_name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| format!("unknown part of speech '{}'", s))
    }
}

/// One word occurrence with its assigned category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedWord {
    /// Surface form as it appears in the document.
    pub value: String,
    /// Category assigned by the tagger.
    pub pos: PartOfSpeech,
}

impl TaggedWord {
    pub fn new(value: impl Into<String>, pos: PartOfSpeech) -> Self {
        Self {
            value: value.into(),
            pos,
        }
    }
}

/// A part-of-speech tagger.
///
/// Consumes raw text and returns the tagged words of each sentence.
/// Implementations are constructed explicitly and injected; there is no
/// process-wide model registration.
pub trait PosTagger: Send + Sync {
    fn tag(&self, document: &str) -> Result<Vec<Vec<TaggedWord>>, TaggerError>;
}
