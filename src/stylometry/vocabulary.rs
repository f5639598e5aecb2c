//! Categorized reference vocabulary (`Id,Pos,Value` CSV).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::pos::PartOfSpeech;
use crate::utilities::errors::ResourceError;
use crate::utilities::resources::read_resource;

/// Vocabulary shipped with the crate.
pub const EMBEDDED_VOCABULARY: &str = include_str!("../../data/parts-of-speech.csv");

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "Id")]
    id: i64,
    #[serde(rename = "Pos")]
    pos: String,
    #[serde(rename = "Value")]
    value: String,
}

/// One vocabulary entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartOfSpeechRecord {
    pub id: i64,
    pub pos: PartOfSpeech,
    pub value: String,
}

/// A parsed vocabulary table, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabularyTable {
    records: Vec<PartOfSpeechRecord>,
}

impl VocabularyTable {
    /// Parse CSV text with an `Id,Pos,Value` header.
    ///
    /// Blank values are skipped; an unknown part of speech is an error.
    pub fn from_csv(text: &str) -> Result<Self, ResourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut records = Vec::new();
        for row in reader.deserialize::<RawRecord>() {
            let raw = row?;
            if raw.value.is_empty() {
                continue;
            }
            let pos = raw
                .pos
                .parse::<PartOfSpeech>()
                .map_err(|_| ResourceError::UnknownPartOfSpeech {
                    id: raw.id,
                    value: raw.pos.clone(),
                })?;
            records.push(PartOfSpeechRecord {
                id: raw.id,
                pos,
                value: raw.value,
            });
        }

        if records.is_empty() {
            return Err(ResourceError::Empty {
                name: "vocabulary".to_string(),
            });
        }
        Ok(Self { records })
    }

    /// Load from `path`, or the embedded vocabulary when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ResourceError> {
        match path {
            Some(path) => Self::from_csv(&read_resource(path)?),
            None => Self::from_csv(EMBEDDED_VOCABULARY),
        }
    }

    pub fn records(&self) -> &[PartOfSpeechRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Lower-cased word → category. The first record for a word wins.
    pub fn lexicon(&self) -> HashMap<String, PartOfSpeech> {
        let mut lexicon = HashMap::new();
        for record in &self.records {
            lexicon
                .entry(record.value.to_lowercase())
                .or_insert(record.pos);
        }
        lexicon
    }
}
