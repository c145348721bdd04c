//! Chat delivery for the digest (Discord REST API)

use async_trait::async_trait;
use serde_json::json;
use std::fmt;
use tracing::{debug, instrument};
use url::Url;

use crate::error::ChatError;

pub const DEFAULT_DISCORD_BASE_URL: &str = "https://discord.com/api/v10";

/// Hard limit on a single Discord message
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send_message(&self, content: &str) -> Result<(), ChatError>;
}

#[derive(Clone)]
pub struct DiscordConfig {
    pub bot_token: String,
    pub channel_id: u64,
    pub base_url: String,
}

impl fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("bot_token", &"<redacted>")
            .field("channel_id", &self.channel_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Posts plain-text messages to one channel as a bot
#[derive(Debug, Clone)]
pub struct DiscordChannel {
    http: reqwest::Client,
    config: DiscordConfig,
}

impl DiscordChannel {
    pub fn new(http: reqwest::Client, config: DiscordConfig) -> Self {
        Self { http, config }
    }

    fn messages_url(&self) -> Result<Url, ChatError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| ChatError::RequestFailed(format!("Invalid Discord base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ChatError::RequestFailed("Discord base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["channels", &self.config.channel_id.to_string(), "messages"]);
        Ok(url)
    }
}

#[async_trait]
impl ChatSink for DiscordChannel {
    #[instrument(skip(self, content), fields(channel_id = self.config.channel_id, len = content.len()))]
    async fn send_message(&self, content: &str) -> Result<(), ChatError> {
        let body = json!({
            "content": content,
            // Digest text comes from third-party titles; never ping anyone
            "allowed_mentions": { "parse": [] },
        });

        let res = self
            .http
            .post(self.messages_url()?)
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.config.bot_token))
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let message = res.text().await.unwrap_or_default();
            return Err(ChatError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        debug!("Discord message sent");
        Ok(())
    }
}

/// Split `text` into chunks of at most `limit` characters, preferring line breaks.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let line_len = line.chars().count();

        if line_len > limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            // Hard-wrap a single oversized line on character boundaries
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { line_len } else { current_len + 1 + line_len };
        if needed > limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
