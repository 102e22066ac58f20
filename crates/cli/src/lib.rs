pub mod commands;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::chat::{ChatArgs, DEFAULT_SENDER};
use commands::replay::{ReplayArgs, DEFAULT_IDENTITY};

#[derive(Debug, Parser)]
#[command(
    name = "concierge",
    about = "Concierge operator CLI",
    long_about = "Chat with the travel concierge, replay transcripts, and inspect the field \
                  schema and effective configuration.",
    after_help = "Examples:\n  concierge chat\n  concierge replay transcript.txt --identity \
                  +351911111111\n  concierge fields --json\n  concierge config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a concierge.toml file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Chat with the concierge on stdin/stdout, one message per line")]
    Chat {
        #[arg(long, help = "Emit one JSON reply object per line")]
        json: bool,
        #[arg(long, default_value = DEFAULT_SENDER, help = "Sender address for the conversation")]
        sender: String,
        #[arg(long, help = "Display name stored with a new conversation")]
        name: Option<String>,
        #[arg(long, help = "Persist conversations to this JSON file")]
        store: Option<PathBuf>,
    },
    #[command(about = "Replay a transcript file (one message per line) and report the outcome")]
    Replay {
        file: PathBuf,
        #[arg(long, default_value = DEFAULT_IDENTITY, help = "Sender address to replay as")]
        identity: String,
        #[arg(long, help = "Persist conversations to this JSON file")]
        store: Option<PathBuf>,
    },
    #[command(about = "Print the field schema in question order")]
    Fields {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "List stored conversations, most recently active first")]
    Conversations {
        #[arg(long, help = "JSON conversation store to read")]
        store: PathBuf,
    },
}

impl Cli {
    pub fn config_path(&self) -> Option<&Path> {
        self.config.as_deref()
    }
}

pub fn execute(cli: Cli) -> ExitCode {
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Command::Chat { json, sender, name, store } => {
            commands::chat::run(config_path, &ChatArgs { sender, display_name: name, json, store })
        }
        Command::Replay { file, identity, store } => {
            commands::replay::run(config_path, &ReplayArgs { file, identity, store })
        }
        Command::Fields { json } => commands::fields::run(config_path, json),
        Command::Config => commands::config::run(config_path),
        Command::Conversations { store } => commands::conversations::run(config_path, &store),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
