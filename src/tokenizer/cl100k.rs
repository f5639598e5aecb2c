//! `cl100k_base` encoder backed by `tiktoken-rs`.

use std::fmt;

use tiktoken_rs::CoreBPE;

use super::{Token, TokenEncoder};
use crate::utilities::errors::TokenizerError;

/// Encoding name of the vocabulary shared by gpt-3.5-turbo and gpt-4.
pub const CL100K_BASE: &str = "cl100k_base";

/// The BPE tokenizer used by the chat backend.
pub struct Cl100kTokenizer {
    bpe: CoreBPE,
}

impl Cl100kTokenizer {
    /// Load the `cl100k_base` ranks.
    pub fn new() -> Result<Self, TokenizerError> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| TokenizerError::Load {
            encoding: CL100K_BASE.to_string(),
            message: e.to_string(),
        })?;
        log::debug!("Loaded {} tokenizer", CL100K_BASE);
        Ok(Self { bpe })
    }
}

impl fmt::Debug for Cl100kTokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cl100kTokenizer").finish_non_exhaustive()
    }
}

impl TokenEncoder for Cl100kTokenizer {
    fn encode(&self, text: &str) -> Vec<Token> {
        // Special-token markers in user text are encoded as plain text.
        self.bpe
            .encode_ordinary(text)
            .into_iter()
            .map(|t| t as Token)
            .collect()
    }

    fn decode(&self, tokens: &[Token]) -> Result<String, TokenizerError> {
        self.bpe
            .decode(tokens.iter().map(|&t| t as _).collect())
            .map_err(|e| TokenizerError::Decode(e.to_string()))
    }

    fn name(&self) -> &str {
        CL100K_BASE
    }
}
