//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use scout_core::config;
use tracing::debug;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

mod commands;

#[derive(Parser)]
#[command(name = "scout")]
#[command(version)]
#[command(about = "Ask Gemini about the profile you are looking at")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v debug, -vv trace); SCOUT_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Ask a question, optionally about a profile
    Ask {
        /// The question (read from stdin when omitted)
        #[arg(short, long)]
        prompt: Option<String>,

        /// JSON file with the profile being viewed
        #[arg(long, value_name = "FILE")]
        profile: Option<PathBuf>,

        /// JSON file with your own profile (overrides user_profile_file)
        #[arg(long, value_name = "FILE")]
        user_profile: Option<PathBuf>,

        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,

        /// Wait for the whole answer instead of streaming it
        #[arg(long = "no-stream")]
        no_stream: bool,

        /// Print the answer as HTML
        #[arg(long)]
        html: bool,

        /// Do not save the exchange to history
        #[arg(long = "no-save")]
        no_save: bool,
    },

    /// Render markdown from a file or stdin
    Render {
        /// Markdown file (stdin when omitted)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Print plain text instead of HTML
        #[arg(long)]
        strip: bool,
    },

    /// Manage saved conversations
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum HistoryCommands {
    /// Lists saved conversations, most recent first
    List,
    /// Shows one conversation
    Show {
        /// Profile URL or conversation hash
        #[arg(value_name = "URL|HASH", allow_hyphen_values = true)]
        key: String,

        /// Print assistant messages as HTML
        #[arg(long)]
        html: bool,
    },
    /// Deletes one conversation, or all of them
    Clear {
        /// Profile URL or conversation hash
        #[arg(
            value_name = "URL|HASH",
            required_unless_present = "all",
            allow_hyphen_values = true
        )]
        key: Option<String>,

        /// Delete every conversation
        #[arg(long, conflicts_with = "key")]
        all: bool,
    },
    /// Prints the whole history as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Deletes conversations idle for longer than the retention period
    Prune {
        /// Retention in days (default: history.retention_days)
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Generate a fresh config from Rust defaults
    Generate,
    /// Send a test request to check the API key
    TestKey,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("SCOUT_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = config::Config::load().context("load config")?;
    debug!(
        path = %config::paths::config_path().display(),
        model = %config.model,
        "Loaded config"
    );

    match cli.command {
        Commands::Ask {
            prompt,
            profile,
            user_profile,
            model,
            no_stream,
            html,
            no_save,
        } => {
            commands::ask::run(commands::ask::AskOptions {
                config: &config,
                prompt: prompt.as_deref(),
                profile: profile.as_deref(),
                user_profile: user_profile.as_deref(),
                model_override: model.as_deref(),
                no_stream,
                html,
                no_save,
            })
            .await
        }

        Commands::Render { file, strip } => commands::render::run(file.as_deref(), strip),

        Commands::History { command } => match command {
            HistoryCommands::List => commands::history::list(&config),
            HistoryCommands::Show { key, html } => commands::history::show(&config, &key, html),
            HistoryCommands::Clear { key, all } => {
                commands::history::clear(&config, key.as_deref(), all)
            }
            HistoryCommands::Export { output } => {
                commands::history::export(&config, output.as_deref())
            }
            HistoryCommands::Prune { days } => commands::history::prune(&config, days),
        },

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::Generate => commands::config::generate(),
            ConfigCommands::TestKey => commands::config::test_key(&config).await,
        },
    }
}
