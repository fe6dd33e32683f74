//! History command handlers.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use scout_core::config::{self, Config};
use scout_core::datefmt;
use scout_core::history::{ChatStore, Role};
use scout_core::markdown;
use scout_core::profile::profile_hash;

fn open_store(config: &Config) -> Result<ChatStore> {
    let path = config::paths::chats_path();
    Ok(ChatStore::open(&path)
        .with_context(|| format!("open chat history at {}", path.display()))?
        .with_max_messages(config.history.max_messages))
}

/// Accepts either a profile URL or an already-hashed key.
fn conversation_key(key: &str) -> String {
    if key.contains("://") {
        profile_hash(key)
    } else {
        key.to_string()
    }
}

pub fn list(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let conversations = store.conversations();
    if conversations.is_empty() {
        println!("No conversations found.");
        return Ok(());
    }

    let now = Local::now();
    for (hash, conv) in conversations {
        let name = conv
            .profile
            .as_ref()
            .map(|p| p.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("(unknown)");
        let last_active = conv.last_active.with_timezone(&Local);
        println!(
            "{hash}  {name}  {} messages  {}",
            conv.messages.len(),
            datefmt::relative_time(&last_active, &now)
        );
    }
    Ok(())
}

pub fn show(config: &Config, key: &str, html: bool) -> Result<()> {
    let store = open_store(config)?;
    let hash = conversation_key(key);
    let Some(conv) = store.conversation(&hash) else {
        println!("Conversation '{key}' not found.");
        return Ok(());
    };

    if let Some(profile) = &conv.profile
        && !profile.name.is_empty()
    {
        println!("# {}", profile.name);
    }

    let now = Local::now();
    let mut previous = None;
    for message in &conv.messages {
        let timestamp = message.timestamp.with_timezone(&Local);
        if datefmt::should_show_date_divider(&timestamp, previous.as_ref()) {
            println!(
                "\n--- {} ---",
                datefmt::format_message_date(&timestamp, &now)
            );
        }

        let time = datefmt::format_message_time(&timestamp);
        match message.role {
            Role::User => println!("[{time}] You: {}", message.content),
            Role::Assistant => {
                let body = if html {
                    markdown::render(&message.content)
                } else {
                    markdown::strip(&message.content)
                };
                println!("[{time}] Scout: {body}");
            }
        }
        previous = Some(timestamp);
    }
    Ok(())
}

pub fn clear(config: &Config, key: Option<&str>, all: bool) -> Result<()> {
    let mut store = open_store(config)?;
    if all {
        let removed = store.clear_all().context("clear chat history")?;
        println!("Deleted {removed} conversation(s).");
        return Ok(());
    }

    let key = key.context("Specify a profile URL or hash, or pass --all")?;
    if store.clear(&conversation_key(key)).context("clear conversation")? {
        println!("Deleted conversation '{key}'.");
    } else {
        println!("Conversation '{key}' not found.");
    }
    Ok(())
}

pub fn export(config: &Config, output: Option<&Path>) -> Result<()> {
    let store = open_store(config)?;
    let json = store.export_json()?;
    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("write export to {}", path.display()))?;
            println!("Exported chat history to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub fn prune(config: &Config, days: Option<u32>) -> Result<()> {
    let mut store = open_store(config)?;
    let days = days.unwrap_or(config.history.retention_days);
    let removed = store
        .prune_older_than(days, Utc::now())
        .context("prune chat history")?;
    println!("Removed {removed} conversation(s) older than {days} days.");
    Ok(())
}
