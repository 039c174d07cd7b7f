//! Telegram channel: long-polls the Bot API for updates.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::watch;

use crate::channels::{Channel, IncomingMessage, MessageStream};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Seconds the server may hold a getUpdates request open.
const LONG_POLL_TIMEOUT_SECS: u64 = 30;

const RETRY_DELAY: Duration = Duration::from_secs(5);

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
    channel_post: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    from: Option<User>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct User {
    #[serde(default)]
    is_bot: bool,
    #[serde(default)]
    first_name: String,
    username: Option<String>,
}

/// Map one update to an inbound message. Updates without text are skipped.
///
/// The chat id is the sender id, so replies and reminders go back to the
/// same conversation.
fn incoming_from_update(update: Update) -> Option<IncomingMessage> {
    let (message, from_channel_post) = match (update.message, update.channel_post) {
        (Some(message), _) => (message, false),
        (None, Some(post)) => (post, true),
        (None, None) => return None,
    };
    let text = message.text?;

    let name = message
        .from
        .as_ref()
        .map(|u| {
            if u.first_name.is_empty() {
                u.username.clone().unwrap_or_default()
            } else {
                u.first_name.clone()
            }
        })
        .unwrap_or_default();

    let mut incoming =
        IncomingMessage::new("telegram", message.chat.id.to_string(), text).with_sender_name(name);
    if message.chat.kind != "private" {
        incoming = incoming.in_group();
    }
    if message.from.as_ref().is_some_and(|u| u.is_bot) {
        incoming = incoming.from_self();
    }
    if from_channel_post {
        incoming = incoming.as_broadcast();
    }
    Some(incoming)
}

/// Telegram channel: connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    api_base: String,
    client: reqwest::Client,
    stop_tx: watch::Sender<bool>,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            bot_token,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
            stop_tx,
        }
    }

    /// Point the channel at a different Bot API host.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    fn send_error(reason: impl Into<String>) -> ChannelError {
        ChannelError::SendFailed {
            name: "telegram".into(),
            reason: reason.into(),
        }
    }

    /// Send a single chunk as Markdown, retrying as plain text if rejected.
    async fn send_message_chunk(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let mut rejected = Vec::new();
        for parse_mode in [Some("Markdown"), None] {
            let mut body = serde_json::json!({ "chat_id": chat_id, "text": text });
            if let Some(mode) = parse_mode {
                body["parse_mode"] = mode.into();
            }
            let resp = self
                .client
                .post(self.api_url("sendMessage"))
                .json(&body)
                .send()
                .await
                .map_err(|e| Self::send_error(e.to_string()))?;

            let status = resp.status();
            if status.is_success() {
                return Ok(());
            }
            let detail = resp.text().await.unwrap_or_default();
            tracing::warn!(
                chat_id = %chat_id,
                status = %status,
                parse_mode = parse_mode.unwrap_or("plain"),
                "Telegram rejected sendMessage"
            );
            rejected.push(format!("{}: {status} {detail}", parse_mode.unwrap_or("plain")));
        }
        Err(Self::send_error(format!(
            "sendMessage failed ({})",
            rejected.join("; ")
        )))
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let client = self.client.clone();
        let mut stop_rx = self.stop_tx.subscribe();

        tokio::spawn(async move {
            let mut offset: i64 = 0;
            tracing::info!("Telegram channel listening for messages");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": LONG_POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message", "channel_post"]
                });

                let poll = async {
                    let resp = client.post(&url).json(&body).send().await?;
                    Ok::<_, reqwest::Error>(resp.json::<UpdatesResponse>().await?)
                };

                let data = tokio::select! {
                    _ = stop_rx.changed() => break,
                    result = poll => match result {
                        Ok(data) => data,
                        Err(e) => {
                            tracing::warn!(error = %e, "Telegram poll error");
                            tokio::time::sleep(RETRY_DELAY).await;
                            continue;
                        }
                    },
                };

                for update in data.result {
                    offset = offset.max(update.update_id + 1);
                    let Some(incoming) = incoming_from_update(update) else {
                        continue;
                    };
                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
            tracing::info!("Telegram polling stopped");
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send(&self, user_id: &str, text: &str) -> Result<(), ChannelError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.send_message_chunk(user_id, &chunk).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|_| ChannelError::HealthCheckFailed {
                name: "telegram".into(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::HealthCheckFailed {
                name: "telegram".into(),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        let _ = self.stop_tx.send(true);
        Ok(())
    }
}

/// Split a message into chunks of at most `max_chars` characters, preferring
/// newlines, then spaces, then a hard cut.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    while remaining.chars().count() > max_chars {
        let limit = remaining
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let window = &remaining[..limit];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(limit);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    if !remaining.is_empty() || chunks.is_empty() {
        chunks.push(remaining.to_string());
    }
    chunks
}
