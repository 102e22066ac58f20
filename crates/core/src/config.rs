use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::conversation::DEFAULT_HISTORY_LIMIT;
use crate::extraction::ExtractionPolicy;
use crate::schema::{FieldDefinition, FieldSchema, SchemaError};

const MAX_HISTORY_LIMIT: usize = 500;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AppConfig {
    pub conversation: ConversationConfig,
    pub extraction: ExtractionPolicy,
    pub logging: LoggingConfig,
    /// Replaces the built-in travel schema when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldDefinition>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConversationConfig {
    pub history_limit: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub history_limit: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("invalid field schema: {0}")]
    Schema(#[from] SchemaError),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self { history_limit: DEFAULT_HISTORY_LIMIT }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("concierge.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// The configured field schema, or the travel schema when none is configured.
    pub fn schema(&self) -> Result<FieldSchema, ConfigError> {
        match &self.fields {
            Some(fields) => Ok(FieldSchema::new(fields.clone())?),
            None => Ok(FieldSchema::travel()),
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(conversation) = patch.conversation {
            if let Some(history_limit) = conversation.history_limit {
                self.conversation.history_limit = history_limit;
            }
        }

        if let Some(extraction) = patch.extraction {
            if let Some(min_message_chars) = extraction.min_message_chars {
                self.extraction.min_message_chars = min_message_chars;
            }
            if let Some(min_literal_chars) = extraction.min_literal_chars {
                self.extraction.min_literal_chars = min_literal_chars;
            }
            if let Some(max_literal_chars) = extraction.max_literal_chars {
                self.extraction.max_literal_chars = max_literal_chars;
            }
            if let Some(max_location_tokens) = extraction.max_location_tokens {
                self.extraction.max_location_tokens = max_location_tokens;
            }
            if let Some(max_travelers) = extraction.max_travelers {
                self.extraction.max_travelers = max_travelers;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(fields) = patch.fields {
            self.fields = Some(fields);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CONCIERGE_CONVERSATION_HISTORY_LIMIT") {
            self.conversation.history_limit =
                parse_usize("CONCIERGE_CONVERSATION_HISTORY_LIMIT", &value)?;
        }

        if let Some(value) = read_env("CONCIERGE_EXTRACTION_MIN_MESSAGE_CHARS") {
            self.extraction.min_message_chars =
                parse_usize("CONCIERGE_EXTRACTION_MIN_MESSAGE_CHARS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_EXTRACTION_MIN_LITERAL_CHARS") {
            self.extraction.min_literal_chars =
                parse_usize("CONCIERGE_EXTRACTION_MIN_LITERAL_CHARS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_EXTRACTION_MAX_LITERAL_CHARS") {
            self.extraction.max_literal_chars =
                parse_usize("CONCIERGE_EXTRACTION_MAX_LITERAL_CHARS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_EXTRACTION_MAX_LOCATION_TOKENS") {
            self.extraction.max_location_tokens =
                parse_usize("CONCIERGE_EXTRACTION_MAX_LOCATION_TOKENS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_EXTRACTION_MAX_TRAVELERS") {
            self.extraction.max_travelers =
                value.parse::<u8>().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "CONCIERGE_EXTRACTION_MAX_TRAVELERS".to_string(),
                    value: value.clone(),
                })?;
        }

        let log_level =
            read_env("CONCIERGE_LOGGING_LEVEL").or_else(|| read_env("CONCIERGE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CONCIERGE_LOGGING_FORMAT").or_else(|| read_env("CONCIERGE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(history_limit) = overrides.history_limit {
            self.conversation.history_limit = history_limit;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_conversation(&self.conversation)?;
        validate_extraction(&self.extraction)?;
        validate_logging(&self.logging)?;
        self.schema()?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("concierge.toml"), PathBuf::from("config/concierge.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_conversation(conversation: &ConversationConfig) -> Result<(), ConfigError> {
    if conversation.history_limit == 0 || conversation.history_limit > MAX_HISTORY_LIMIT {
        return Err(ConfigError::Validation(format!(
            "conversation.history_limit must be in range 1..={MAX_HISTORY_LIMIT}"
        )));
    }
    Ok(())
}

fn validate_extraction(extraction: &ExtractionPolicy) -> Result<(), ConfigError> {
    if extraction.min_literal_chars == 0 {
        return Err(ConfigError::Validation(
            "extraction.min_literal_chars must be greater than zero".to_string(),
        ));
    }

    if extraction.max_literal_chars < extraction.min_literal_chars {
        return Err(ConfigError::Validation(
            "extraction.max_literal_chars must not be below extraction.min_literal_chars"
                .to_string(),
        ));
    }

    if extraction.max_location_tokens == 0 {
        return Err(ConfigError::Validation(
            "extraction.max_location_tokens must be greater than zero".to_string(),
        ));
    }

    if extraction.max_travelers < 2 {
        return Err(ConfigError::Validation(
            "extraction.max_travelers must be at least 2".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    conversation: Option<ConversationPatch>,
    extraction: Option<ExtractionPatch>,
    logging: Option<LoggingPatch>,
    fields: Option<Vec<FieldDefinition>>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    history_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractionPatch {
    min_message_chars: Option<usize>,
    min_literal_chars: Option<usize>,
    max_literal_chars: Option<usize>,
    max_location_tokens: Option<usize>,
    max_travelers: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
