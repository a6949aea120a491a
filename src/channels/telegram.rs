//! Telegram channel. Long-polls the Bot API for updates.
//!
//! Native Rust Telegram Bot API implementation: `getUpdates` for messages
//! and button presses, plus the handful of send methods the bot uses.

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};

use crate::channels::{
    BotCommand, ButtonAction, Channel, EventStream, InboundEvent, Keyboard, Messenger,
};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Telegram Bot API channel using long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    allowed_users: Vec<String>,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            allowed_users,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.bot_token, method)
    }

    /// Check if any of the provided identities is allowed.
    pub fn is_any_user_allowed<'a, I>(&self, identities: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        check_user_allowed(&self.allowed_users, identities)
    }

    /// Send a single message chunk (≤4096 chars), Markdown-first with fallback.
    async fn send_message_chunk(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let mut markdown_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown"
        });
        if let Some(keyboard) = keyboard {
            markdown_body["reply_markup"] = reply_markup(keyboard);
        }

        let markdown_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&markdown_body)
            .send()
            .await
            .map_err(send_failed)?;

        if markdown_resp.status().is_success() {
            return Ok(());
        }

        let markdown_status = markdown_resp.status();
        tracing::warn!(
            status = ?markdown_status,
            "Telegram sendMessage with Markdown failed; retrying without parse_mode"
        );

        // Retry without parse_mode
        let mut plain_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(keyboard) = keyboard {
            plain_body["reply_markup"] = reply_markup(keyboard);
        }
        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&plain_body)
            .send()
            .await
            .map_err(send_failed)?;

        if !plain_resp.status().is_success() {
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!(
                    "sendMessage failed (markdown: {}, plain: {})",
                    markdown_status, plain_err
                ),
            });
        }

        Ok(())
    }

    /// POST a JSON body and fail on a non-success status.
    async fn call(&self, method: &str, body: &serde_json::Value) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(send_failed)?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("{method} failed: {err}"),
            });
        }
        Ok(())
    }
}

// ── Messenger implementation ────────────────────────────────────────

#[async_trait]
impl Messenger for TelegramChannel {
    /// Splits long messages; the keyboard is attached to the last chunk.
    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.iter().enumerate() {
            let markup = if i == last { keyboard } else { None };
            self.send_message_chunk(chat_id, chunk, markup).await?;
        }
        Ok(())
    }

    async fn send_document(&self, chat_id: &str, path: &Path) -> Result<(), ChannelError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file");

        let file_bytes = tokio::fs::read(path).await?;
        let part = Part::bytes(file_bytes).file_name(file_name.to_string());

        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);

        let resp = self
            .client
            .post(self.api_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(send_failed)?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("sendDocument failed: {err}"),
            });
        }

        tracing::info!("Telegram document sent to {chat_id}: {file_name}");
        Ok(())
    }

    async fn set_commands(&self, commands: &[BotCommand]) -> Result<(), ChannelError> {
        let commands: Vec<serde_json::Value> = commands
            .iter()
            .map(|c| {
                serde_json::json!({
                    "command": c.command,
                    "description": c.description
                })
            })
            .collect();
        self.call("setMyCommands", &serde_json::json!({ "commands": commands }))
            .await?;
        tracing::info!(count = commands.len(), "Telegram command menu registered");
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChannelError> {
        self.call(
            "answerCallbackQuery",
            &serde_json::json!({ "callback_query_id": callback_id }),
        )
        .await?;
        tracing::debug!("Answered callback query {callback_id}");
        Ok(())
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let bot_token = self.bot_token.clone();
        let allowed_users = self.allowed_users.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let url = api_url(&bot_token, "getUpdates");
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: serde_json::Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let results = match update_results(&data) {
                    Ok(results) => results,
                    Err(reason) => {
                        tracing::warn!("Telegram getUpdates rejected: {reason}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64)
                    {
                        offset = uid + 1;
                    }

                    let Some(parsed) = parse_update(update) else {
                        continue;
                    };

                    let mut identities = vec![parsed.event.user_id.as_str()];
                    if let Some(ref username) = parsed.username {
                        identities.push(username.as_str());
                    }
                    if !check_user_allowed(&allowed_users, identities) {
                        tracing::warn!(
                            "Telegram: ignoring update from unauthorized user: \
                             username={}, user_id={}",
                            parsed.username.as_deref().unwrap_or("unknown"),
                            parsed.event.user_id
                        );
                        continue;
                    }

                    if tx.send(parsed.event).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn api_url(bot_token: &SecretString, method: &str) -> String {
    format!(
        "https://api.telegram.org/bot{}/{method}",
        bot_token.expose_secret()
    )
}

fn send_failed(e: reqwest::Error) -> ChannelError {
    ChannelError::SendFailed {
        name: "telegram".into(),
        reason: e.to_string(),
    }
}

/// The `result` array of a `getUpdates` reply, or the API's error text.
fn update_results(data: &serde_json::Value) -> Result<&Vec<serde_json::Value>, String> {
    if let Some(results) = data.get("result").and_then(serde_json::Value::as_array) {
        return Ok(results);
    }
    let code = data
        .get("error_code")
        .and_then(serde_json::Value::as_i64)
        .unwrap_or_default();
    let description = data
        .get("description")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("no result field");
    Err(format!("{code}: {description}"))
}

/// An allowed-listable inbound update.
struct ParsedUpdate {
    event: InboundEvent,
    username: Option<String>,
}

/// Turn a raw update into an event. Non-text messages and malformed
/// updates are skipped.
fn parse_update(update: &serde_json::Value) -> Option<ParsedUpdate> {
    if let Some(callback) = update.get("callback_query") {
        let id = callback.get("id")?.as_str()?;
        let data = callback.get("data")?.as_str()?;
        let from = callback.get("from")?;
        let user_id = from.get("id")?.as_i64()?.to_string();
        let chat_id = callback
            .get("message")?
            .get("chat")?
            .get("id")?
            .as_i64()?
            .to_string();
        return Some(ParsedUpdate {
            event: InboundEvent::callback(user_id, chat_id, id, data),
            username: username_of(from),
        });
    }

    let message = update.get("message")?;
    let text = message.get("text")?.as_str()?;
    let from = message.get("from")?;
    let user_id = from.get("id")?.as_i64()?.to_string();
    let chat_id = message.get("chat")?.get("id")?.as_i64()?.to_string();
    Some(ParsedUpdate {
        event: InboundEvent::from_message(user_id, chat_id, text),
        username: username_of(from),
    })
}

fn username_of(from: &serde_json::Value) -> Option<String> {
    from.get("username")
        .and_then(|u| u.as_str())
        .map(String::from)
}

/// Build the `reply_markup` object for an inline keyboard.
fn reply_markup(keyboard: &Keyboard) -> serde_json::Value {
    let rows: Vec<Vec<serde_json::Value>> = keyboard
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| match &button.action {
                    ButtonAction::Callback(action) => serde_json::json!({
                        "text": button.text,
                        "callback_data": action.data()
                    }),
                    ButtonAction::Url(url) => serde_json::json!({
                        "text": button.text,
                        "url": url
                    }),
                })
                .collect()
        })
        .collect();
    serde_json::json!({ "inline_keyboard": rows })
}

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Split a message into chunks of at most `max_chars` characters.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        // Byte offset of the first char past the limit, if any.
        let Some((limit, _)) = remaining.char_indices().nth(max_chars) else {
            chunks.push(remaining.to_string());
            break;
        };

        let chunk = &remaining[..limit];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(limit);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { limit } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
