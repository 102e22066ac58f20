use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use concierge_agent::{ConversationRuntime, InboundMessage};

use crate::commands::{block_on, build_runtime, load_config, CommandResult, EXIT_FAILURE};

pub const DEFAULT_SENDER: &str = "local:operator";
const QUIT_COMMANDS: &[&str] = &["/quit", "/exit"];

#[derive(Debug, Clone)]
pub struct ChatArgs {
    pub sender: String,
    pub display_name: Option<String>,
    pub json: bool,
    pub store: Option<PathBuf>,
}

pub fn run(config_path: Option<&Path>, args: &ChatArgs) -> CommandResult {
    let config = match load_config("chat", config_path) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("chat", &config, args.store.as_deref()) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let session = block_on("chat", run_session(&runtime, args, stdin.lock(), stdout.lock()));
    match session {
        Ok(Ok(turns)) => CommandResult::success("chat", format!("chat ended after {turns} turns")),
        Ok(Err(error)) => CommandResult::failure("chat", "io", format!("{error:#}"), EXIT_FAILURE),
        Err(result) => result,
    }
}

/// Reads one message per line until end of input or `/quit`, writing each reply. Returns the
/// number of turns processed.
pub async fn run_session<R, W>(
    runtime: &ConversationRuntime,
    args: &ChatArgs,
    input: R,
    mut output: W,
) -> Result<usize>
where
    R: BufRead,
    W: Write,
{
    if !args.json {
        writeln!(output, "Chatting as {}. Type /quit to leave.", args.sender)
            .context("failed to write chat banner")?;
    }

    let mut turns = 0;
    for line in input.lines() {
        let line = line.context("failed to read chat input")?;
        let message = line.trim();
        if QUIT_COMMANDS.contains(&message) {
            break;
        }
        if message.is_empty() {
            continue;
        }

        let mut inbound = InboundMessage::new(args.sender.as_str(), message);
        if let Some(display_name) = &args.display_name {
            inbound = inbound.with_display_name(display_name.as_str());
        }
        let reply = runtime.handle_message(inbound).await;
        turns += 1;

        if args.json {
            let encoded = serde_json::to_string(&reply).context("failed to encode reply")?;
            writeln!(output, "{encoded}").context("failed to write reply")?;
        } else {
            writeln!(output, "concierge ({}%): {}", reply.completion_percentage, reply.reply)
                .context("failed to write reply")?;
        }
        output.flush().context("failed to flush reply")?;
    }

    Ok(turns)
}
