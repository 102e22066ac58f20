use std::env;
use std::fs;
use std::io::Cursor;
use std::sync::{Mutex, OnceLock};

use concierge_cli::commands::chat::{self, ChatArgs};
use concierge_cli::commands::replay::{self, ReplayArgs};
use concierge_cli::commands::{config, conversations, fields};
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn fields_lists_the_travel_schema_in_question_order() {
    with_env(&[], || {
        let result = fields::run(None, true);
        assert_eq!(result.exit_code, 0, "expected fields listing to succeed");

        let payload = parse_payload(&result.output);
        let rows = payload["fields"].as_array().expect("fields array");
        assert_eq!(rows.len(), 15);
        assert_eq!(rows[0]["key"], "destination");
        assert_eq!(rows[1]["key"], "departure_location");
    });
}

#[test]
fn config_reports_env_sources() {
    with_env(&[("CONCIERGE_LOG_LEVEL", "debug")], || {
        let result = config::run(None);
        assert_eq!(result.exit_code, 0, "expected config inspection to succeed");

        assert!(result
            .output
            .contains("- logging.level = debug (source: env (CONCIERGE_LOG_LEVEL))"));
        assert!(result.output.contains("- conversation.history_limit = 20 (source: default)"));
    });
}

#[test]
fn config_sources_skip_blank_env_values() {
    with_env(
        &[("CONCIERGE_LOGGING_LEVEL", "   "), ("CONCIERGE_EXTRACTION_MAX_LOCATION_TOKENS", "5")],
        || {
            let result = config::run(None);
            assert_eq!(result.exit_code, 0, "expected config inspection to succeed");

            assert!(result.output.contains("- logging.level = info (source: default)"));
            assert!(result.output.contains(
                "- extraction.max_location_tokens = 5 \
                 (source: env (CONCIERGE_EXTRACTION_MAX_LOCATION_TOKENS))"
            ));
        },
    );
}

#[test]
fn invalid_env_override_is_a_config_failure() {
    with_env(&[("CONCIERGE_CONVERSATION_HISTORY_LIMIT", "lots")], || {
        let result = fields::run(None, true);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "fields");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn replay_fills_slots_from_a_transcript() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let transcript = dir.path().join("chat.txt");
        fs::write(&transcript, "# first contact\nhello\nLisbon\nfrom London\n")
            .expect("write transcript");

        let result = replay::run(
            None,
            &ReplayArgs {
                file: transcript,
                identity: "whatsapp:+351911111111".into(),
                store: None,
            },
        );
        assert_eq!(result.exit_code, 0, "expected replay to succeed: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["identity"], "+351911111111");
        assert_eq!(payload["turns"].as_array().map(Vec::len), Some(3));
        assert_eq!(payload["slots"]["destination"], "Lisbon");
        assert_eq!(payload["slots"]["departure_location"], "London");
        assert_eq!(payload["conversation_status"], "collecting_info");
    });
}

#[test]
fn replay_of_a_missing_transcript_is_an_io_failure() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let result = replay::run(
            None,
            &ReplayArgs {
                file: dir.path().join("missing.txt"),
                identity: replay::DEFAULT_IDENTITY.into(),
                store: None,
            },
        );
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "replay");
        assert_eq!(payload["error_class"], "io");
    });
}

#[test]
fn conversations_lists_what_replay_stored() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let store = dir.path().join("conversations.json");
        let transcript = dir.path().join("chat.txt");
        fs::write(&transcript, "Lisbon\n").expect("write transcript");

        let replayed = replay::run(
            None,
            &ReplayArgs {
                file: transcript,
                identity: "+447700900000".into(),
                store: Some(store.clone()),
            },
        );
        assert_eq!(replayed.exit_code, 0, "expected replay to succeed: {}", replayed.output);

        let result = conversations::run(None, &store);
        assert_eq!(result.exit_code, 0, "expected listing to succeed: {}", result.output);

        let payload = parse_payload(&result.output);
        let rows = payload["conversations"].as_array().expect("conversations array");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "+447700900000");
        assert_eq!(rows[0]["display_name"], "Unknown Traveler");
        assert_eq!(rows[0]["next_field"], "departure_location");
    });
}

#[test]
fn chat_session_answers_each_line_until_quit() {
    with_env(&[], || {
        let runtime = concierge_runtime();
        let args = ChatArgs {
            sender: chat::DEFAULT_SENDER.into(),
            display_name: Some("Ana".into()),
            json: false,
            store: None,
        };
        let input = Cursor::new("hello\n\nLisbon\n/quit\nignored\n");
        let mut output = Vec::new();

        let turns = block_on(chat::run_session(&runtime, &args, input, &mut output))
            .expect("chat session");
        let output = String::from_utf8(output).expect("utf8 output");

        assert_eq!(turns, 2);
        assert!(output.starts_with("Chatting as local:operator."));
        assert!(output.contains("concierge (0%): Hi! I'd love to help plan your trip."));
        assert!(output.contains("Lisbon sounds amazing!"));
        assert!(!output.contains("ignored"));
    });
}

#[test]
fn chat_session_emits_json_lines() {
    with_env(&[], || {
        let runtime = concierge_runtime();
        let args = ChatArgs {
            sender: "sms:+15550001111".into(),
            display_name: None,
            json: true,
            store: None,
        };
        let mut output = Vec::new();

        block_on(chat::run_session(&runtime, &args, Cursor::new("Lisbon\n"), &mut output))
            .expect("chat session");
        let output = String::from_utf8(output).expect("utf8 output");

        let reply = parse_payload(last_line(&output));
        assert_eq!(reply["conversation_id"], "+15550001111");
        assert_eq!(reply["status"], "collecting_info");
        assert_eq!(reply["completion_percentage"], 7);
    });
}

fn concierge_runtime() -> concierge_agent::ConversationRuntime {
    use std::sync::Arc;

    use concierge_agent::{ConversationRuntime, InMemoryConversationStore};
    use concierge_core::flows::ConversationEngine;

    ConversationRuntime::new(
        Arc::new(ConversationEngine::default()),
        Arc::new(InMemoryConversationStore::default()),
    )
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime")
        .block_on(future)
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "CONCIERGE_CONVERSATION_HISTORY_LIMIT",
        "CONCIERGE_EXTRACTION_MIN_MESSAGE_CHARS",
        "CONCIERGE_EXTRACTION_MIN_LITERAL_CHARS",
        "CONCIERGE_EXTRACTION_MAX_LITERAL_CHARS",
        "CONCIERGE_EXTRACTION_MAX_LOCATION_TOKENS",
        "CONCIERGE_EXTRACTION_MAX_TRAVELERS",
        "CONCIERGE_LOGGING_LEVEL",
        "CONCIERGE_LOGGING_FORMAT",
        "CONCIERGE_LOG_LEVEL",
        "CONCIERGE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
