//! Application configuration.
//!
//! Settings come from a JSON file (`appsettings.json` unless overridden by
//! `PERSONA_CONFIG` or `--config`), then environment variables are layered on
//! top. A missing file is not an error: defaults plus environment are used.
//!
//! ```json
//! {
//!   "General": { "Persona": "Trained", "Temperature": 0.7 },
//!   "OpenAI": { "Model": "gpt-4o-mini", "Key": "sk-..." },
//!   "Logging": { "Filter": "persona_chat=debug" }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chat::history::DEFAULT_HISTORY_TOKEN_BUDGET;
use crate::persona::PersonaMode;
use crate::utilities::errors::ConfigError;

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "appsettings.json";

/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_ENV: &str = "PERSONA_CONFIG";

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    #[serde(rename = "OpenAI")]
    pub openai: OpenAIConfig,
    pub logging: LoggingConfig,
}

/// Persona and conversation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GeneralConfig {
    pub persona: PersonaMode,
    pub temperature: f32,
    pub history_token_budget: usize,
    /// Replaces the embedded part-of-speech vocabulary.
    pub vocabulary_path: Option<PathBuf>,
    /// Replaces the embedded training text.
    pub training_text_path: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            persona: PersonaMode::Random,
            temperature: 0.0,
            history_token_budget: DEFAULT_HISTORY_TOKEN_BUDGET,
            vocabulary_path: None,
            training_text_path: None,
        }
    }
}

/// Completion backend connection settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OpenAIConfig {
    pub model: String,
    pub key: String,
    pub base_url: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            key: String::new(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            max_retries: 3,
            timeout_secs: 120,
        }
    }
}

// Keeps the key out of debug logs.
impl std::fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("model", &self.model)
            .field("key", &if self.key.is_empty() { "" } else { "***" })
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Configuration file to read: `explicit`, else `PERSONA_CONFIG`, else
    /// [`DEFAULT_CONFIG_FILE`].
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Parse a configuration file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No configuration file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Layer environment overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.openai.key = key;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.openai.model = model;
        }
        if let Some(base_url) = lookup("OPENAI_BASE_URL") {
            self.openai.base_url = base_url;
        }
        if let Some(mode) = lookup("PERSONA_MODE") {
            self.general.persona = mode.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "PERSONA_MODE".to_string(),
                value: mode.clone(),
            })?;
        }
        Ok(())
    }

    /// Check every constraint, reporting all failures at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        if self.openai.model.trim().is_empty() {
            problems.push("OpenAI:Model is required".to_string());
        }
        if self.openai.key.trim().is_empty() {
            problems.push("OpenAI:Key is required".to_string());
        }
        if !(0.0..=2.0).contains(&self.general.temperature) {
            problems.push(format!(
                "General:Temperature must be between 0 and 2, got {}",
                self.general.temperature
            ));
        }
        if self.general.history_token_budget == 0 {
            problems.push("General:HistoryTokenBudget must be greater than 0".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(problems))
        }
    }

    /// File, then process environment, then validation.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = Self::resolve_path(explicit);
        let mut config = Self::from_file(&path)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        log::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn valid() -> AppConfig {
        let mut config = AppConfig::default();
        config.openai.model = "gpt-4o-mini".into();
        config.openai.key = "sk-test".into();
        config
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.general.persona, PersonaMode::Random);
        assert_eq!(config.general.history_token_budget, 2048);
        assert_eq!(config.openai.base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(config.openai.max_retries, 3);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_from_file_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"General": {{"Persona": "Trained", "Temperature": 0.7}},
                "OpenAI": {{"Model": "gpt-4o", "Key": "sk-file"}}}}"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.general.persona, PersonaMode::Trained);
        assert!((config.general.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.general.history_token_budget, 2048);
        assert_eq!(config.openai.model, "gpt-4o");
        assert_eq!(config.openai.timeout_secs, 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::from_file(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-env"),
            ("OPENAI_MODEL", "gpt-env"),
            ("PERSONA_MODE", "punctuation"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_env(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.openai.key, "sk-env");
        assert_eq!(config.openai.model, "gpt-env");
        assert_eq!(config.openai.base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(config.general.persona, PersonaMode::Punctuation);
    }

    #[test]
    fn test_env_invalid_persona() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(|name| (name == "PERSONA_MODE").then(|| "pirate".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref value, .. } if value == "pirate"));
    }

    #[test]
    fn test_validation_collects_all_problems() {
        let mut config = AppConfig::default();
        config.general.temperature = 3.5;
        config.general.history_token_budget = 0;
        match config.validate() {
            Err(ConfigError::Validation(problems)) => assert_eq!(problems.len(), 4),
            other => panic!("expected validation failure, got {:?}", other),
        }
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", valid().openai);
        assert!(!rendered.contains("sk-test"));
        assert!(rendered.contains("gpt-4o-mini"));
    }
}
