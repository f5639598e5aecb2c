//! Persona selection: turn a [`PersonaMode`] into the fixed
//! [`ChatSettings`] shared by every chat turn.
//!
//! ```text
//! Base        → no bias
//! Punctuation → ".", "!", "?" in every surface form, +10
//! Random      → vocabulary ──random::generate──▶ biases
//! Trained     → training text ──LexiconTagger──▶ FrequencyTable ──score──▶ biases
//! ```
//!
//! Settings are computed once at startup. Missing or empty corpus resources
//! are fatal.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::chat::message::ChatSettings;
use crate::stylometry::{analyze, random, scorer, LexiconTagger, LogitBias, VocabularyTable};
use crate::tokenizer::{expand, TokenEncoder};
use crate::utilities::config::GeneralConfig;
use crate::utilities::errors::{PersonaError, ResourceError};
use crate::utilities::resources::read_resource;

/// Training text shipped with the crate.
pub const EMBEDDED_TRAINING_TEXT: &str = include_str!("../../data/persona.txt");

pub const PUNCTUATION_MARKS: [&str; 3] = [".", "!", "?"];
pub const PUNCTUATION_BIAS: i32 = 10;

/// Strategy that populates the logit-bias map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PersonaMode {
    /// No bias at all.
    Base,
    /// Favour sentence-ending punctuation.
    Punctuation,
    /// Uniform random biases over the reference vocabulary.
    #[default]
    Random,
    /// Biases learned from the training text.
    Trained,
}

impl PersonaMode {
    pub const ALL: [PersonaMode; 4] = [Self::Base, Self::Punctuation, Self::Random, Self::Trained];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "Base",
            Self::Punctuation => "Punctuation",
            Self::Random => "Random",
            Self::Trained => "Trained",
        }
    }
}

impl fmt::Display for PersonaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonaMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown persona '{}'", s))
    }
}

/// Where the corpus resources come from. `None` selects the embedded copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonaSources {
    pub vocabulary_path: Option<PathBuf>,
    pub training_text_path: Option<PathBuf>,
}

impl PersonaSources {
    pub fn from_config(general: &GeneralConfig) -> Self {
        Self {
            vocabulary_path: general.vocabulary_path.clone(),
            training_text_path: general.training_text_path.clone(),
        }
    }
}

/// Read the training text from `path`, or the embedded text.
pub fn load_training_text(path: Option<&Path>) -> Result<String, ResourceError> {
    let text = match path {
        Some(path) => read_resource(path)?,
        None => EMBEDDED_TRAINING_TEXT.to_string(),
    };
    if text.trim().is_empty() {
        return Err(ResourceError::Empty {
            name: "training text".to_string(),
        });
    }
    Ok(text)
}

/// Every surface-form token of the sentence-ending marks, biased +10,
/// ordered by token descending.
pub fn punctuation_biases(encoder: &dyn TokenEncoder) -> Vec<LogitBias> {
    let mut tokens: Vec<_> = PUNCTUATION_MARKS
        .iter()
        .flat_map(|mark| expand(encoder, mark))
        .collect();
    tokens.sort_unstable_by(|a, b| b.cmp(a));
    tokens.dedup();
    tokens
        .into_iter()
        .map(|token| LogitBias::new(token, PUNCTUATION_BIAS))
        .collect()
}

/// Biases learned from `text`, tagged with a lexicon built from `vocabulary`.
pub fn trained_biases(
    encoder: &dyn TokenEncoder,
    vocabulary: &VocabularyTable,
    text: &str,
) -> Result<Vec<LogitBias>, PersonaError> {
    let tagger = LexiconTagger::from_vocabulary(vocabulary);
    let table = analyze(&tagger, text)?;
    Ok(scorer::score(encoder, &table))
}

/// The bias list for `mode`.
pub fn persona_biases<R: Rng + ?Sized>(
    mode: PersonaMode,
    encoder: &dyn TokenEncoder,
    sources: &PersonaSources,
    rng: &mut R,
) -> Result<Vec<LogitBias>, PersonaError> {
    let biases = match mode {
        PersonaMode::Base => Vec::new(),
        PersonaMode::Punctuation => punctuation_biases(encoder),
        PersonaMode::Random => {
            let vocabulary = VocabularyTable::load(sources.vocabulary_path.as_deref())?;
            random::generate(encoder, &vocabulary, rng)
        }
        PersonaMode::Trained => {
            let vocabulary = VocabularyTable::load(sources.vocabulary_path.as_deref())?;
            let text = load_training_text(sources.training_text_path.as_deref())?;
            trained_biases(encoder, &vocabulary, &text)?
        }
    };
    log::info!("Persona {} uses {} logit biases", mode, biases.len());
    Ok(biases)
}

/// Chat settings for `mode` at `temperature`.
pub fn build_chat_settings<R: Rng + ?Sized>(
    mode: PersonaMode,
    temperature: f32,
    encoder: &dyn TokenEncoder,
    sources: &PersonaSources,
    rng: &mut R,
) -> Result<ChatSettings, PersonaError> {
    let biases = persona_biases(mode, encoder, sources, rng)?;
    Ok(ChatSettings::with_biases(temperature, &biases))
}
