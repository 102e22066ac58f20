use std::path::Path;

use chrono::{DateTime, Utc};
use concierge_agent::ConversationRecord;
use concierge_core::progress::filled_count;
use concierge_core::schema::FieldSchema;
use serde::Serialize;

use crate::commands::{
    block_on, build_runtime, load_config, render_json, CommandResult, EXIT_FAILURE,
};

#[derive(Debug, Serialize)]
struct ConversationsReport {
    command: &'static str,
    status: &'static str,
    count: usize,
    conversations: Vec<ConversationRow>,
}

#[derive(Debug, Serialize)]
struct ConversationRow {
    id: String,
    display_name: String,
    status: &'static str,
    completion_percentage: u8,
    filled_fields: usize,
    next_field: Option<String>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl ConversationRow {
    /// Counts only schema fields, so the row agrees with its completion percentage.
    fn new(schema: &FieldSchema, record: ConversationRecord) -> Self {
        Self {
            status: record.status(),
            last_activity: record.last_activity(),
            filled_fields: filled_count(schema, &record.state.slots),
            next_field: record.state.expected_field_key.clone(),
            completion_percentage: record.state.completion_percentage,
            created_at: record.created_at,
            display_name: record.display_name,
            id: record.id.0,
        }
    }
}

/// Lists stored conversations, most recently active first.
pub fn run(config_path: Option<&Path>, store: &Path) -> CommandResult {
    let config = match load_config("conversations", config_path) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("conversations", &config, Some(store)) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let records = match block_on("conversations", runtime.conversations()) {
        Ok(Ok(records)) => records,
        Ok(Err(error)) => {
            return CommandResult::failure(
                "conversations",
                "persistence",
                error.to_string(),
                EXIT_FAILURE,
            )
        }
        Err(result) => return result,
    };

    let schema = runtime.engine().schema();
    let rows: Vec<ConversationRow> =
        records.into_iter().map(|record| ConversationRow::new(schema, record)).collect();

    let report = ConversationsReport {
        command: "conversations",
        status: "ok",
        count: rows.len(),
        conversations: rows,
    };
    render_json("conversations", &report)
}
