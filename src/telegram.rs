//! A minimal client for the Telegram Bot HTTP API.
//!
//! Only the three methods the bot needs are implemented: `getMe` to verify
//! the token at startup, `getUpdates` to long-poll for inbound messages and
//! `sendMessage` for replies and notifications.

use crate::config::TelegramConfig;
use crate::core::{InboundEvent, MessageSender, SubscriberId};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Pause between failed `getUpdates` calls.
const UPDATE_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Errors returned by the Telegram client.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("HTTP request to Telegram failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telegram API error ({}): {description}", .code.map_or_else(|| "?".to_string(), |c| c.to_string()))]
    Api {
        code: Option<i64>,
        description: String,
    },
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

/// The bot account returned by `getMe`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BotUser {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl Update {
    /// Converts the update into an inbound event, if it carries a message.
    pub fn into_event(self) -> Option<InboundEvent> {
        self.message.map(|message| InboundEvent {
            sender: SubscriberId(message.chat.id),
            text: message.text,
        })
    }
}

#[derive(Serialize)]
struct GetUpdates<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

/// Client for a single bot token.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_url: String,
    token: String,
    request_timeout: Duration,
    long_poll_timeout: Duration,
}

// The token is a credential; keep it out of logs.
impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("long_poll_timeout", &self.long_poll_timeout)
            .finish()
    }
}

impl TelegramClient {
    /// Creates a client for `token` using the endpoints and timeouts in `config`.
    pub fn new(token: impl Into<String>, config: &TelegramConfig) -> Result<Self, TelegramError> {
        let client = Client::builder()
            .user_agent(concat!("statuswatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: token.into(),
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
            long_poll_timeout: Duration::from_secs(config.long_poll_timeout_seconds),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T, TelegramError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| e.without_url())?;

        // Telegram answers errors with a JSON body too, so the HTTP status is
        // not checked before decoding.
        let reply: ApiResponse<T> = response.json().await.map_err(|e| e.without_url())?;
        match (reply.ok, reply.result) {
            (true, Some(result)) => Ok(result),
            (_, _) => Err(TelegramError::Api {
                code: reply.error_code,
                description: reply
                    .description
                    .unwrap_or_else(|| format!("{} returned no result", method)),
            }),
        }
    }

    /// Verifies the token and returns the bot account.
    pub async fn get_me(&self) -> Result<BotUser, TelegramError> {
        self.call("getMe", &json!({}), self.request_timeout).await
    }

    /// Long-polls for updates with ids at or above `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        let body = GetUpdates {
            offset,
            timeout: self.long_poll_timeout.as_secs(),
            allowed_updates: &["message"],
        };
        // The server may hold the request for the whole long-poll window.
        let timeout = self.long_poll_timeout + self.request_timeout;
        self.call("getUpdates", &body, timeout).await
    }

    /// Sends a plain-text message to `chat_id`.
    #[instrument(skip(self, text))]
    pub async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let body = json!({ "chat_id": chat_id, "text": text });
        let _: serde_json::Value = self.call("sendMessage", &body, self.request_timeout).await?;
        Ok(())
    }

    /// Feeds inbound messages into `events` until shutdown.
    ///
    /// Failed polls are logged and retried after a short pause. The loop also
    /// ends when every receiver of `events` has been dropped.
    pub async fn run_updates(
        &self,
        events: async_channel::Sender<InboundEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("Telegram update listener started.");
        let mut offset = 0;
        loop {
            let result = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("Telegram update listener received shutdown signal.");
                    break;
                }
                res = self.get_updates(offset) => res,
            };

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "Received updates");
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        let Some(event) = update.into_event() else {
                            continue;
                        };
                        if events.send(event).await.is_err() {
                            info!("Inbound event channel closed, Telegram update listener shutting down.");
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to get updates, retrying in {:?}", UPDATE_RETRY_DELAY);
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.changed() => {
                            info!("Telegram update listener received shutdown signal.");
                            break;
                        }
                        _ = tokio::time::sleep(UPDATE_RETRY_DELAY) => {}
                    }
                }
            }
        }
        info!("Telegram update listener finished.");
    }
}

#[async_trait]
impl MessageSender for TelegramClient {
    async fn send_message(&self, recipient: SubscriberId, text: &str) -> anyhow::Result<()> {
        Ok(self.send_text(recipient.as_i64(), text).await?)
    }
}
