//! Shared infrastructure: configuration, error types, resource loading and
//! iterator adapters.

pub mod config;
pub mod errors;
pub mod iter;
pub mod resources;

pub use config::AppConfig;
pub use errors::{
    BackendError, ChatError, ConfigError, PersonaError, ResourceError, TaggerError, TokenizerError,
};
