//! Subword tokenizer contract and adapters.
//!
//! The bias engine and the history windower only ever see the
//! [`TokenEncoder`] trait. [`Cl100kTokenizer`] binds it to the `cl100k_base`
//! BPE vocabulary used by the OpenAI chat models.

pub mod cl100k;
pub mod variants;

pub use cl100k::Cl100kTokenizer;
pub use variants::{expand, expand_in_order, AugmentedTokenSet};

use crate::utilities::errors::TokenizerError;

/// Identifier of one unit of a fixed subword vocabulary.
pub type Token = u32;

/// A deterministic text encoder over a fixed vocabulary.
pub trait TokenEncoder: Send + Sync {
    /// Encode `text` into token IDs.
    fn encode(&self, text: &str) -> Vec<Token>;

    /// Decode token IDs back into text.
    fn decode(&self, tokens: &[Token]) -> Result<String, TokenizerError>;

    /// Number of tokens `text` costs. Empty text costs nothing.
    fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.encode(text).len()
    }

    /// Encoding name, for logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic in-memory encoder for tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::{Token, TokenEncoder};
    use crate::utilities::errors::TokenizerError;

    /// Splits text into GPT-style pieces (leading whitespace glued to the
    /// following word, punctuation on its own) and interns each distinct
    /// piece as a token.
    #[derive(Debug, Default)]
    pub struct InternEncoder {
        inner: Mutex<Interner>,
    }

    #[derive(Debug, Default)]
    struct Interner {
        ids: HashMap<String, Token>,
        pieces: Vec<String>,
    }

    impl InternEncoder {
        pub fn new() -> Self {
            Self::default()
        }

        /// Token for a single piece, interning it if needed.
        pub fn token_of(&self, piece: &str) -> Token {
            let mut inner = self.inner.lock().unwrap();
            if let Some(&id) = inner.ids.get(piece) {
                return id;
            }
            let id = inner.pieces.len() as Token;
            inner.pieces.push(piece.to_string());
            inner.ids.insert(piece.to_string(), id);
            id
        }

        fn pieces(text: &str) -> Vec<String> {
            let mut pieces = Vec::new();
            let mut current = String::new();
            let mut in_word = false;
            for ch in text.chars() {
                if ch.is_whitespace() {
                    if in_word {
                        pieces.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                    current.push(ch);
                } else if ch.is_alphanumeric() || ch == '\'' {
                    in_word = true;
                    current.push(ch);
                } else {
                    if in_word {
                        pieces.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                    current.push(ch);
                    pieces.push(std::mem::take(&mut current));
                }
            }
            if !current.is_empty() {
                pieces.push(current);
            }
            pieces
        }
    }

    impl TokenEncoder for InternEncoder {
        fn encode(&self, text: &str) -> Vec<Token> {
            Self::pieces(text)
                .iter()
                .map(|piece| self.token_of(piece))
                .collect()
        }

        fn decode(&self, tokens: &[Token]) -> Result<String, TokenizerError> {
            let inner = self.inner.lock().unwrap();
            tokens
                .iter()
                .map(|&t| {
                    inner
                        .pieces
                        .get(t as usize)
                        .cloned()
                        .ok_or_else(|| TokenizerError::Decode(format!("unknown token {}", t)))
                })
                .collect()
        }

        fn name(&self) -> &str {
            "intern"
        }
    }

    #[test]
    fn test_intern_encoder_pieces() {
        let enc = InternEncoder::new();
        let tokens = enc.encode("The cat sat.");
        assert_eq!(tokens.len(), 4);
        assert_eq!(enc.decode(&tokens).unwrap(), "The cat sat.");
        assert_eq!(enc.encode(" cat"), vec![enc.token_of(" cat")]);
        assert_eq!(enc.count_tokens(""), 0);
    }
}
