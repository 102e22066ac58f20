use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;

use crate::commands::{load_config, CommandResult};

struct Entry {
    key_path: &'static str,
    env_key: Option<&'static str>,
    value: String,
}

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let config = match load_config("config", config_path) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let config_file_path = detect_config_path(config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let extraction = &config.extraction;
    let field_count = config.schema().map(|schema| schema.len()).unwrap_or_default();
    let entries = [
        Entry {
            key_path: "conversation.history_limit",
            env_key: Some("CONCIERGE_CONVERSATION_HISTORY_LIMIT"),
            value: config.conversation.history_limit.to_string(),
        },
        Entry {
            key_path: "extraction.min_message_chars",
            env_key: Some("CONCIERGE_EXTRACTION_MIN_MESSAGE_CHARS"),
            value: extraction.min_message_chars.to_string(),
        },
        Entry {
            key_path: "extraction.min_literal_chars",
            env_key: Some("CONCIERGE_EXTRACTION_MIN_LITERAL_CHARS"),
            value: extraction.min_literal_chars.to_string(),
        },
        Entry {
            key_path: "extraction.max_literal_chars",
            env_key: Some("CONCIERGE_EXTRACTION_MAX_LITERAL_CHARS"),
            value: extraction.max_literal_chars.to_string(),
        },
        Entry {
            key_path: "extraction.max_location_tokens",
            env_key: Some("CONCIERGE_EXTRACTION_MAX_LOCATION_TOKENS"),
            value: extraction.max_location_tokens.to_string(),
        },
        Entry {
            key_path: "extraction.max_travelers",
            env_key: Some("CONCIERGE_EXTRACTION_MAX_TRAVELERS"),
            value: extraction.max_travelers.to_string(),
        },
        Entry {
            key_path: "logging.level",
            env_key: Some("CONCIERGE_LOGGING_LEVEL"),
            value: config.logging.level.clone(),
        },
        Entry {
            key_path: "logging.format",
            env_key: Some("CONCIERGE_LOGGING_FORMAT"),
            value: format!("{:?}", config.logging.format),
        },
        Entry {
            key_path: "fields",
            env_key: None,
            value: if config.fields.is_some() {
                format!("{field_count} configured fields")
            } else {
                format!("built-in travel schema ({field_count} fields)")
            },
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in &entries {
        lines.push(render_line(
            entry.key_path,
            &entry.value,
            field_source(
                entry.key_path,
                entry.env_key,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        ));
    }

    CommandResult::raw(lines.join("\n"))
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from("concierge.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/concierge.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        let aliased = key_path
            .strip_prefix("logging.")
            .map(|suffix| format!("CONCIERGE_LOG_{}", suffix.to_ascii_uppercase()));
        for candidate in std::iter::once(env_key.to_owned()).chain(aliased) {
            if env::var(&candidate).is_ok_and(|value| !value.trim().is_empty()) {
                return format!("env ({candidate})");
            }
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
