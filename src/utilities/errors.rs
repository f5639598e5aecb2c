//! Error types shared across the persona engine and the chat pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating [`AppConfig`](crate::utilities::config::AppConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file exists but could not be read.
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the expected shape.
    #[error("Failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An environment override carries a value that cannot be used.
    #[error("Invalid value '{value}' for environment variable {name}")]
    InvalidEnv { name: String, value: String },

    /// One or more validation rules failed.
    #[error("Configuration validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

/// Errors raised while loading corpus resources (vocabulary table, training text).
#[derive(Debug, Error)]
pub enum ResourceError {
    /// A configured resource path does not exist.
    #[error("Required resource not found: {path}")]
    Missing { path: PathBuf },

    /// A resource exists but could not be read.
    #[error("Failed to read resource {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The vocabulary table is not valid CSV.
    #[error("Malformed vocabulary table: {0}")]
    Csv(#[from] csv::Error),

    /// A vocabulary record names a part of speech we do not know.
    #[error("Unknown part of speech '{value}' in vocabulary record {id}")]
    UnknownPartOfSpeech { id: i64, value: String },

    /// A resource parsed fine but holds nothing usable.
    #[error("Resource '{name}' is empty")]
    Empty { name: String },
}

/// Errors from the subword tokenizer adapter.
#[derive(Debug, Error)]
pub enum TokenizerError {
    /// The BPE ranks could not be loaded.
    #[error("Failed to load tokenizer '{encoding}': {message}")]
    Load { encoding: String, message: String },

    /// A token sequence could not be decoded back to text.
    #[error("Failed to decode tokens: {0}")]
    Decode(String),
}

/// Errors from a part-of-speech tagger.
#[derive(Debug, Error)]
pub enum TaggerError {
    /// The tagger could not process the document.
    #[error("Tagging failed: {0}")]
    Failed(String),
}

/// Errors from the completion backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// No API key was configured for a backend that needs one.
    #[error("API key not set for model '{model}'")]
    MissingApiKey { model: String },

    /// Transport-level failure (connect, TLS, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-retryable status.
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Every retry attempt failed.
    #[error("Backend call failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// The stream was interrupted or carried an error event.
    #[error("Stream failure: {0}")]
    Stream(String),
}

/// Errors surfaced by a chat turn.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The backend failed before or during streaming.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The turn was cancelled; delivered tokens stay delivered.
    #[error("Chat turn cancelled")]
    Cancelled,

    /// The stream ended without an end-of-stream marker.
    #[error("Stream ended unexpectedly")]
    UnexpectedEnd,
}

/// Errors raised while building a persona's chat settings.
#[derive(Debug, Error)]
pub enum PersonaError {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Tagger(#[from] TaggerError),
}
