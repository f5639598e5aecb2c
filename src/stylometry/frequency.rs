//! Per-category word frequencies of a document.

use std::collections::{BTreeMap, HashMap};

use super::pos::{PartOfSpeech, PosTagger};
use crate::utilities::errors::TaggerError;

/// Lower-cased word counts of one category, kept in order of first
/// occurrence in the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordCounts {
    entries: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl WordCounts {
    fn record(&mut self, word: String) {
        match self.index.get(&word) {
            Some(&slot) => self.entries[slot].1 += 1,
            None => {
                self.index.insert(word.clone(), self.entries.len());
                self.entries.push((word, 1));
            }
        }
    }

    /// `(word, count)` pairs, first-seen word first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.entries.iter().map(|(word, count)| (word.as_str(), *count))
    }

    pub fn sum(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }
}

/// Lower-cased word → occurrences, for each category.
///
/// Built once per document and read-only afterwards. Categories are ordered;
/// words within a category keep their document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: BTreeMap<PartOfSpeech, WordCounts>,
    total_word_count: usize,
}

impl FrequencyTable {
    /// Build a table from `(word, category)` occurrences.
    pub fn from_occurrences<'a, I>(occurrences: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, PartOfSpeech)>,
    {
        let mut table = Self::default();
        for (word, pos) in occurrences {
            table
                .counts
                .entry(pos)
                .or_default()
                .record(word.to_lowercase());
            table.total_word_count += 1;
        }
        table
    }

    /// Occurrences of every word across every category.
    pub fn total_word_count(&self) -> usize {
        self.total_word_count
    }

    /// Word counts for `pos`, if any word carried that tag.
    pub fn words(&self, pos: PartOfSpeech) -> Option<&WordCounts> {
        self.counts.get(&pos)
    }

    /// Total occurrences tagged `pos`.
    pub fn category_sum(&self, pos: PartOfSpeech) -> usize {
        self.words(pos).map_or(0, WordCounts::sum)
    }

    /// Categories present in the table.
    pub fn categories(&self) -> impl Iterator<Item = PartOfSpeech> + '_ {
        self.counts.keys().copied()
    }
}

/// Tag `document` once and count every word under its category.
pub fn analyze(tagger: &dyn PosTagger, document: &str) -> Result<FrequencyTable, TaggerError> {
    let sentences = tagger.tag(document)?;
    let table = FrequencyTable::from_occurrences(
        sentences
            .iter()
            .flatten()
            .map(|word| (word.value.as_str(), word.pos)),
    );
    log::debug!(
        "Analyzed {} sentences: {} words across {} categories",
        sentences.len(),
        table.total_word_count(),
        table.categories().count()
    );
    Ok(table)
}
