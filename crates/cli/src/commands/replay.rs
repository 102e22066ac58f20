use std::fs;
use std::path::{Path, PathBuf};

use concierge_agent::InboundMessage;
use concierge_core::domain::slots::TravelInfo;
use serde::Serialize;

use crate::commands::{
    block_on, build_runtime, load_config, render_json, CommandResult, EXIT_FAILURE,
};

pub const DEFAULT_IDENTITY: &str = "replay";

#[derive(Debug, Clone)]
pub struct ReplayArgs {
    pub file: PathBuf,
    pub identity: String,
    pub store: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    command: &'static str,
    status: &'static str,
    identity: String,
    turns: Vec<ReplayTurn>,
    conversation_status: String,
    completion_percentage: u8,
    slots: TravelInfo,
}

#[derive(Debug, Serialize)]
struct ReplayTurn {
    message: String,
    reply: String,
    completion_percentage: u8,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    fallback: bool,
}

/// Messages in a transcript: one per line, blank lines and `#` comments skipped.
pub fn transcript_messages(raw: &str) -> Vec<&str> {
    raw.lines().map(str::trim).filter(|line| !line.is_empty() && !line.starts_with('#')).collect()
}

pub fn run(config_path: Option<&Path>, args: &ReplayArgs) -> CommandResult {
    let config = match load_config("replay", config_path) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let raw = match fs::read_to_string(&args.file) {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult::failure(
                "replay",
                "io",
                format!("could not read transcript `{}`: {error}", args.file.display()),
                EXIT_FAILURE,
            )
        }
    };
    let messages = transcript_messages(&raw);
    if messages.is_empty() {
        return CommandResult::failure(
            "replay",
            "empty_transcript",
            "transcript has no messages",
            EXIT_FAILURE,
        );
    }

    let runtime = match build_runtime("replay", &config, args.store.as_deref()) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let replayed = block_on("replay", async {
        let mut turns = Vec::with_capacity(messages.len());
        for message in &messages {
            let reply =
                runtime.handle_message(InboundMessage::new(args.identity.as_str(), *message)).await;
            turns.push(ReplayTurn {
                message: (*message).to_owned(),
                reply: reply.reply,
                completion_percentage: reply.completion_percentage,
                fallback: reply.fallback,
            });
        }
        let records = runtime.conversations().await;
        (turns, records)
    });
    let (turns, records) = match replayed {
        Ok(replayed) => replayed,
        Err(result) => return result,
    };

    let identity = InboundMessage::new(args.identity.as_str(), "").conversation_id();
    let record = match records {
        Ok(records) => records.into_iter().find(|record| record.id == identity),
        Err(error) => {
            return CommandResult::failure("replay", "persistence", error.to_string(), EXIT_FAILURE);
        }
    };
    let Some(record) = record else {
        return CommandResult::failure(
            "replay",
            "persistence",
            "conversation was not stored after replay",
            EXIT_FAILURE,
        );
    };

    let report = ReplayReport {
        command: "replay",
        status: "ok",
        identity: identity.as_str().to_owned(),
        turns,
        conversation_status: record.status().to_owned(),
        completion_percentage: record.state.completion_percentage,
        slots: record.state.slots,
    };
    render_json("replay", &report)
}
