use std::path::Path;

use serde::Serialize;

use crate::commands::{load_config, render_json, CommandResult, EXIT_CONFIG};

#[derive(Debug, Serialize)]
struct FieldsReport<'a> {
    command: &'static str,
    status: &'static str,
    count: usize,
    fields: Vec<FieldRow<'a>>,
}

#[derive(Debug, Serialize)]
struct FieldRow<'a> {
    position: usize,
    key: &'a str,
    kind: concierge_core::schema::FieldKind,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    acknowledgment_template: Option<&'a str>,
    #[serde(skip_serializing_if = "no_keywords")]
    keywords: &'a [String],
}

fn no_keywords(keywords: &&[String]) -> bool {
    keywords.is_empty()
}

pub fn run(config_path: Option<&Path>, json: bool) -> CommandResult {
    let config = match load_config("fields", config_path) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let schema = match config.schema() {
        Ok(schema) => schema,
        Err(error) => {
            return CommandResult::failure(
                "fields",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG,
            )
        }
    };

    let rows: Vec<FieldRow<'_>> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(index, field)| FieldRow {
            position: index + 1,
            key: &field.key,
            kind: field.kind,
            prompt: &field.prompt,
            acknowledgment_template: field.acknowledgment_template.as_deref(),
            keywords: &field.keywords,
        })
        .collect();

    if json {
        let report =
            FieldsReport { command: "fields", status: "ok", count: rows.len(), fields: rows };
        return render_json("fields", &report);
    }

    let mut lines = vec![format!("field schema ({} fields, asked in this order):", rows.len())];
    for row in &rows {
        lines.push(format!("{:>2}. {} [{:?}] {}", row.position, row.key, row.kind, row.prompt));
        if !row.keywords.is_empty() {
            lines.push(format!("    keywords: {}", row.keywords.join(", ")));
        }
    }
    CommandResult::raw(lines.join("\n"))
}
