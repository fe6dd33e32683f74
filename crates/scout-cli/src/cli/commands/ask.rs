//! Ask command handler.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use scout_core::config::{self, Config};
use scout_core::core::{ChatSession, Reply};
use scout_core::history::ChatStore;
use scout_core::markdown;
use scout_core::profile::{Profile, UserProfile};
use tracing::debug;

/// Options for running a single question.
pub struct AskOptions<'a> {
    pub config: &'a Config,
    pub prompt: Option<&'a str>,
    pub profile: Option<&'a Path>,
    pub user_profile: Option<&'a Path>,
    pub model_override: Option<&'a str>,
    pub no_stream: bool,
    pub html: bool,
    pub no_save: bool,
}

pub async fn run(opts: AskOptions<'_>) -> Result<()> {
    let mut config = opts.config.clone();
    if let Some(model) = opts.model_override {
        config.model = model.to_string();
    }
    if opts.no_stream {
        config.stream = false;
    }

    let question = match opts.prompt {
        Some(prompt) => prompt.to_string(),
        None => super::read_input(None)?,
    };
    let question = question.trim();
    if question.is_empty() {
        bail!("No question given. Pass --prompt or pipe it on stdin.");
    }

    let profile = opts
        .profile
        .map(Profile::load)
        .transpose()
        .context("load profile")?;
    let user_profile_path = opts
        .user_profile
        .map(Path::to_path_buf)
        .or_else(|| config.user_profile_path());
    let user_profile = user_profile_path
        .as_deref()
        .map(UserProfile::load)
        .transpose()
        .context("load user profile")?;
    if let Some(profile) = &profile {
        debug!(name = %profile.name, hash = %profile.hash(), "Loaded viewed profile");
    }
    if let Some(path) = &user_profile_path {
        debug!(path = %path.display(), "Loaded user profile");
    }

    let mut session = ChatSession::from_config(&config)?
        .with_profile(profile)
        .with_user_profile(user_profile);
    if !opts.no_save {
        let chats_path = config::paths::chats_path();
        let store = ChatStore::open(&chats_path)
            .with_context(|| format!("open chat history at {}", chats_path.display()))?
            .with_max_messages(config.history.max_messages);
        session = session.with_store(store);
    }

    // HTML needs the whole answer, so it is printed once at the end.
    let live = config.stream && !opts.html;
    let mut printer = StreamPrinter::default();
    let exchange = session
        .ask(question, |text| {
            if live {
                printer.update(text);
            }
        })
        .await?;

    match exchange.reply {
        Reply::Answer(text) => {
            if opts.html {
                println!("{}", markdown::render(&text));
            } else if live {
                printer.finish(&text);
            } else {
                println!("{text}");
            }
            Ok(())
        }
        Reply::Notice { notice, detail } => {
            printer.abandon();
            Err(match detail {
                Some(detail) => anyhow!(detail).context(notice.message()),
                None => anyhow!(notice.message()),
            })
        }
    }
}

/// Prints streamed snapshots as deltas.
#[derive(Debug, Default)]
struct StreamPrinter {
    printed: String,
}

impl StreamPrinter {
    fn update(&mut self, full_text: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Some(delta) = full_text.strip_prefix(self.printed.as_str()) {
            let _ = stdout.write_all(delta.as_bytes());
        } else {
            // A retry restarted the answer.
            let _ = writeln!(stdout);
            let _ = stdout.write_all(full_text.as_bytes());
        }
        let _ = stdout.flush();
        self.printed.clear();
        self.printed.push_str(full_text);
    }

    fn finish(&mut self, final_text: &str) {
        if self.printed != final_text {
            self.update(final_text);
        }
        println!();
    }

    fn abandon(&mut self) {
        if !self.printed.is_empty() {
            println!();
        }
    }
}
