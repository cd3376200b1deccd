//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments, wires the store, transport, and
//! orchestrator together, and runs the selected command.

pub mod account;
pub mod chat;
pub mod conversations;
pub mod health;
pub mod say;
pub mod settings;
pub mod transcript;

#[cfg(test)]
mod tests;

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::auth::{AuthSession, AuthState};
use crate::cli::conversations::{run_conversations, run_export, ConversationCommands};
use crate::cli::settings::{describe_all, CurrentSettings, SetContext, SettingError, SettingRegistry};
use crate::core::chat_stream::HttpTransport;
use crate::core::config::data::Config;
use crate::core::export::ExportFormat;
use crate::core::orchestrator::{ChatOrchestrator, TurnSettings};
use crate::core::store::{
    ChatState, ConversationStore, JsonFileStorage, SharedStore, AUTH_STORE_KEY, CHAT_STORE_KEY,
};
use crate::utils::logging::init_tracing;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nbuild date: ",
    env!("VERGEN_BUILD_DATE"),
    "\ntarget: ",
    env!("VERGEN_CARGO_TARGET_TRIPLE"),
    "\nrustc: ",
    env!("VERGEN_RUSTC_SEMVER"),
);

#[derive(Parser, Debug)]
#[command(name = "samvad")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "A terminal chat client for the Samvad backend")]
#[command(
    long_about = "Samvad is a line-oriented chat client for the Samvad backend. Replies stream \
in as they are generated, and every conversation is kept on disk so you can pick it up later.\n\n\
Environment Variables:\n\
  SAMVAD_BACKEND_URL  Backend base URL (defaults to http://localhost:3000)\n\
  SAMVAD_DATA_DIR     Directory for conversation and sign-in data\n\
  SAMVAD_LOG          Log filter, e.g. 'debug' or 'samvad=trace' (defaults to warn)\n\n\
Chat commands:\n\
  /new, /list, /switch <n>, /show, /rename <title>, /delete, /help, /quit\n\
  Ctrl+C while a reply is arriving stops it"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Backend base URL for this run
    #[arg(short = 'b', long, global = true, value_name = "URL")]
    pub backend: Option<String>,

    /// Ask for whole replies instead of streamed ones
    #[arg(long, global = true)]
    pub no_stream: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the chat interface (default)
    Chat,
    /// Send one message and print the reply
    Say {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Check whether the backend is reachable and configured
    Health,
    /// List and manage saved conversations
    #[command(alias = "conv")]
    Conversations {
        #[command(subcommand)]
        command: Option<ConversationCommands>,
    },
    /// Export every conversation to a file
    Export {
        /// json or txt
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,
        /// Defaults to chat-history-<date>.<ext> in the working directory
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Set configuration values, or list them when no key is given
    Set {
        key: Option<String>,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Restore a configuration value to its default
    Unset { key: String },
    /// Sign in (the demo account is demo@samvadgpt.com / demo123)
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account and sign in
    Signup,
    /// Sign out
    Logout,
    /// Show who is signed in
    Whoami,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async_main(args));
    // A pending stdin read would otherwise hold the runtime open.
    runtime.shutdown_background();
    result
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    init_tracing(args.log.as_deref())?;

    let mut config = Config::load()?;
    if let Some(url) = args.backend {
        config.backend_url = Some(url);
    }
    if args.no_stream {
        config.streaming = Some(false);
    }
    let data_dir = config.snapshot_dir()?;

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let transport = HttpTransport::from_config(&config)?;
            health::warn_if_setup_needed(&transport).await;
            let orchestrator = ChatOrchestrator::new(
                open_chat_store(&data_dir),
                transport,
                TurnSettings::from_config(&config),
            );
            chat::run_chat(&orchestrator).await
        }
        Commands::Say { prompt } => {
            let orchestrator = ChatOrchestrator::new(
                open_chat_store(&data_dir),
                HttpTransport::from_config(&config)?,
                TurnSettings::from_config(&config),
            );
            say::run_say(&orchestrator, prompt).await
        }
        Commands::Health => health::run_health(&HttpTransport::from_config(&config)?).await,
        Commands::Conversations { command } => {
            run_conversations(&open_chat_store(&data_dir), command)
        }
        Commands::Export { format, output } => {
            run_export(&open_chat_store(&data_dir), format, output)
        }
        Commands::Set { key, value } => {
            let store = open_chat_store(&data_dir);
            let Some(key) = key else {
                print_settings(&config, &store);
                return Ok(());
            };
            let config_path = Config::get_config_path()?;
            let mut ctx = SetContext {
                config_path: &config_path,
                chat: &store,
            };
            report_setting(apply_setting(&key, Some(value.as_slice()), &mut ctx));
            Ok(())
        }
        Commands::Unset { key } => {
            let store = open_chat_store(&data_dir);
            let config_path = Config::get_config_path()?;
            let mut ctx = SetContext {
                config_path: &config_path,
                chat: &store,
            };
            report_setting(apply_setting(&key, None, &mut ctx));
            Ok(())
        }
        Commands::Login { email } => account::run_login(&mut open_auth(&data_dir), email).await,
        Commands::Signup => account::run_signup(&mut open_auth(&data_dir)).await,
        Commands::Logout => {
            account::run_logout(&mut open_auth(&data_dir));
            Ok(())
        }
        Commands::Whoami => {
            println!("{}", account::describe_session(&open_auth(&data_dir)));
            Ok(())
        }
    }
}

fn open_chat_store(data_dir: &Path) -> SharedStore {
    let storage: JsonFileStorage<ChatState> = JsonFileStorage::for_key(data_dir, CHAT_STORE_KEY);
    SharedStore::new(ConversationStore::open(storage))
}

fn open_auth(data_dir: &Path) -> AuthSession {
    let storage: JsonFileStorage<AuthState> = JsonFileStorage::for_key(data_dir, AUTH_STORE_KEY);
    AuthSession::open(storage)
}

fn print_settings(config: &Config, store: &SharedStore) {
    let registry = SettingRegistry::new();
    let lines = store.read(|store| {
        describe_all(
            &registry,
            &CurrentSettings {
                config,
                chat: store.config(),
                theme: store.theme(),
            },
        )
    });
    println!("Current configuration:");
    for line in lines {
        println!("{line}");
    }
}

/// `Some(args)` sets the key, `None` unsets it.
fn apply_setting(
    key: &str,
    args: Option<&[String]>,
    ctx: &mut SetContext<'_>,
) -> Result<String, SettingError> {
    let registry = SettingRegistry::new();
    let handler = registry
        .get(key)
        .ok_or_else(|| SettingError::UnknownKey(key.to_string()))?;
    match args {
        Some(args) => handler.set(args, ctx),
        None => handler.unset(ctx),
    }
}

fn report_setting(result: Result<String, SettingError>) {
    match result {
        Ok(message) => println!("{message}"),
        Err(err) => {
            err.print();
            std::process::exit(1);
        }
    }
}
