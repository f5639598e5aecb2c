//! Surface-form expansion of a word or phrase into token IDs.
//!
//! The backend encodes `cat`, ` cat`, `Cat` and `CAT` as different token
//! sequences. A bias placed on only one of them is sidestepped by the model
//! emitting another, so every bias is replicated across all of them.

use std::collections::BTreeSet;

use super::{Token, TokenEncoder};

/// Unique tokens covering every surface form of one word or phrase.
pub type AugmentedTokenSet = BTreeSet<Token>;

/// Expand `text` into the union of the tokens of its surface forms.
///
/// Forms: the text itself, a leading-space form, lower case, upper case,
/// capitalized (texts longer than one character) and title case (texts
/// with an internal space). Empty text expands to an empty set.
pub fn expand(encoder: &dyn TokenEncoder, text: &str) -> AugmentedTokenSet {
    expand_in_order(encoder, text).into_iter().collect()
}

/// The tokens of [`expand`] in surface-form order: the plain encoding
/// first, then the leading-space form and so on. A token repeated by a
/// later form keeps its first position.
pub fn expand_in_order(encoder: &dyn TokenEncoder, text: &str) -> Vec<Token> {
    let mut seen = BTreeSet::new();
    surface_forms(text)
        .iter()
        .flat_map(|form| encoder.encode(form))
        .filter(|token| seen.insert(*token))
        .collect()
}

/// The distinct surface forms [`expand`] encodes, in generation order.
pub fn surface_forms(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut forms = vec![
        text.to_string(),
        format!(" {}", text),
        text.to_lowercase(),
        text.to_uppercase(),
    ];
    if text.chars().count() > 1 {
        forms.push(capitalize(text));
    }
    if text.trim().contains(' ') {
        forms.push(title_case(text));
    }

    let mut seen = BTreeSet::new();
    forms.retain(|form| seen.insert(form.clone()));
    forms
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
