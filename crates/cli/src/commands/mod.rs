pub mod chat;
pub mod config;
pub mod conversations;
pub mod fields;
pub mod replay;

use std::path::Path;
use std::sync::Arc;

use concierge_agent::{
    ConversationRuntime, ConversationStore, InMemoryConversationStore, JsonFileConversationStore,
};
use concierge_core::config::{AppConfig, LoadOptions};
use concierge_core::flows::ConversationEngine;
use serde::Serialize;

pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG: u8 = 2;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Plain or pre-rendered output with a zero exit code.
    pub fn raw(output: impl Into<String>) -> Self {
        Self { exit_code: 0, output: output.into() }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn render_json<T: Serialize>(command: &str, report: &T) -> CommandResult {
    match serde_json::to_string_pretty(report) {
        Ok(output) => CommandResult::raw(output),
        Err(error) => {
            CommandResult::failure(command, "serialization", error.to_string(), EXIT_FAILURE)
        }
    }
}

pub(crate) fn load_config(
    command: &str,
    config_path: Option<&Path>,
) -> Result<AppConfig, CommandResult> {
    let options = LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        require_file: config_path.is_some(),
        ..LoadOptions::default()
    };
    AppConfig::load(options).map_err(|error| {
        CommandResult::failure(command, "config_validation", error.to_string(), EXIT_CONFIG)
    })
}

/// Builds a runtime over the JSON store at `store`, or an in-memory store when unset.
pub(crate) fn build_runtime(
    command: &str,
    config: &AppConfig,
    store: Option<&Path>,
) -> Result<ConversationRuntime, CommandResult> {
    let schema = config.schema().map_err(|error| {
        CommandResult::failure(command, "config_validation", error.to_string(), EXIT_CONFIG)
    })?;
    let engine = ConversationEngine::from_schema(schema, config.extraction.clone())
        .with_history_limit(config.conversation.history_limit);
    let store: Arc<dyn ConversationStore> = match store {
        Some(path) => Arc::new(JsonFileConversationStore::new(path)),
        None => Arc::new(InMemoryConversationStore::default()),
    };
    Ok(ConversationRuntime::new(Arc::new(engine), store))
}

pub(crate) fn block_on<F: std::future::Future>(
    command: &str,
    future: F,
) -> Result<F::Output, CommandResult> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
        |error| CommandResult::failure(command, "runtime_init", error.to_string(), EXIT_FAILURE),
    )?;
    Ok(runtime.block_on(future))
}
