//! Per-profile chat history.
//!
//! All conversations live in one pretty-printed JSON map keyed by profile
//! hash (`$SCOUT_HOME/chats.json`). The store is loaded whole, mutated in
//! memory and written back atomically after every change.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::profile::Profile;

/// Default number of messages kept per conversation.
pub const DEFAULT_MAX_MESSAGES: usize = 50;

/// Default retention for idle conversations.
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn id_suffix(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "ai",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: message_id(role, timestamp),
            role,
            content: content.into(),
            timestamp,
        }
    }
}

/// `msg_{unix_millis}_{role}_{8 hex}`
fn message_id(role: Role, timestamp: DateTime<Utc>) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!(
        "msg_{}_{}_{}",
        timestamp.timestamp_millis(),
        role.id_suffix(),
        &nonce[..8]
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub last_active: DateTime<Utc>,
}

impl Conversation {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            profile: None,
            messages: Vec::new(),
            last_active: now,
        }
    }
}

/// JSON-file backed conversation store.
#[derive(Debug)]
pub struct ChatStore {
    path: PathBuf,
    max_messages: usize,
    chats: BTreeMap<String, Conversation>,
}

impl ChatStore {
    /// Opens the store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: &Path) -> Result<Self> {
        let chats = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read chat history from {}", path.display()))?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents).with_context(|| {
                    format!("Failed to parse chat history from {}", path.display())
                })?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            max_messages: DEFAULT_MAX_MESSAGES,
            chats,
        })
    }

    /// Sets the per-conversation message cap. Zero keeps everything.
    #[must_use]
    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records a question and its answer, trimming to the newest
    /// `max_messages`.
    ///
    /// # Errors
    /// Returns an error if the store cannot be written. The store is left
    /// unchanged in that case.
    pub fn append_exchange(
        &mut self,
        hash: &str,
        profile: Option<&Profile>,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<()> {
        let now = Utc::now();
        let max_messages = self.max_messages;
        self.update(|chats| {
            let conversation = chats
                .entry(hash.to_string())
                .or_insert_with(|| Conversation::new(now));

            if let Some(profile) = profile {
                let mut profile = profile.clone();
                profile.scraped_at.get_or_insert(now);
                conversation.profile = Some(profile);
            }

            conversation
                .messages
                .push(ChatMessage::new(Role::User, user_text, now));
            conversation
                .messages
                .push(ChatMessage::new(Role::Assistant, assistant_text, now));
            trim_to(&mut conversation.messages, max_messages);
            conversation.last_active = now;
        })
    }

    /// Records a single message.
    ///
    /// # Errors
    /// Returns an error if the store cannot be written.
    pub fn append_message(&mut self, hash: &str, role: Role, content: &str) -> Result<()> {
        let now = Utc::now();
        let max_messages = self.max_messages;
        self.update(|chats| {
            let conversation = chats
                .entry(hash.to_string())
                .or_insert_with(|| Conversation::new(now));

            conversation
                .messages
                .push(ChatMessage::new(role, content, now));
            trim_to(&mut conversation.messages, max_messages);
            conversation.last_active = now;
        })
    }

    pub fn conversation(&self, hash: &str) -> Option<&Conversation> {
        self.chats.get(hash)
    }

    /// All conversations, most recently active first.
    pub fn conversations(&self) -> Vec<(&str, &Conversation)> {
        let mut all: Vec<_> = self
            .chats
            .iter()
            .map(|(hash, conv)| (hash.as_str(), conv))
            .collect();
        all.sort_by(|a, b| b.1.last_active.cmp(&a.1.last_active));
        all
    }

    /// Deletes one conversation. Returns whether it existed.
    ///
    /// # Errors
    /// Returns an error if the store cannot be written.
    pub fn clear(&mut self, hash: &str) -> Result<bool> {
        if !self.chats.contains_key(hash) {
            return Ok(false);
        }
        self.update(|chats| chats.remove(hash).is_some())
    }

    /// Deletes every conversation. Returns how many were removed.
    ///
    /// # Errors
    /// Returns an error if the store cannot be written.
    pub fn clear_all(&mut self) -> Result<usize> {
        self.update(|chats| {
            let removed = chats.len();
            chats.clear();
            removed
        })
    }

    /// Pretty JSON of the whole store, in the on-disk format.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn export_json(&self) -> Result<String> {
        to_json(&self.chats)
    }

    /// Drops conversations idle for more than `days`. Returns how many were
    /// removed. A retention reaching past the earliest representable date
    /// keeps everything.
    ///
    /// # Errors
    /// Returns an error if the store cannot be written.
    pub fn prune_older_than(&mut self, days: u32, now: DateTime<Utc>) -> Result<usize> {
        let Some(cutoff) =
            Duration::try_days(i64::from(days)).and_then(|age| now.checked_sub_signed(age))
        else {
            return Ok(0);
        };
        if self.chats.values().all(|conv| conv.last_active >= cutoff) {
            return Ok(0);
        }
        self.update(|chats| {
            let before = chats.len();
            chats.retain(|_, conv| conv.last_active >= cutoff);
            before - chats.len()
        })
    }

    /// Applies `change` to a copy of the conversations and keeps the copy
    /// only once it is on disk.
    fn update<R>(
        &mut self,
        change: impl FnOnce(&mut BTreeMap<String, Conversation>) -> R,
    ) -> Result<R> {
        let mut next = self.chats.clone();
        let result = change(&mut next);
        self.write(&next)?;
        self.chats = next;
        Ok(result)
    }

    fn write(&self, chats: &BTreeMap<String, Conversation>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = to_json(chats)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, contents)
            .with_context(|| format!("Failed to write chat history to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;
        Ok(())
    }
}

fn to_json(chats: &BTreeMap<String, Conversation>) -> Result<String> {
    serde_json::to_string_pretty(chats).context("Failed to serialize chat history")
}

fn trim_to(messages: &mut Vec<ChatMessage>, max: usize) {
    if max > 0 && messages.len() > max {
        messages.drain(..messages.len() - max);
    }
}
