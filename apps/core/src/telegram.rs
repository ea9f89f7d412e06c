//! Telegram Bot API binding.
//!
//! Outbound: `sendMessage` behind the [`Transport`] trait. Inbound:
//! long-polling `getUpdates`, forwarding text messages as [`Inbound`] events.

use crate::actors::traits::Transport;
use crate::error::AppError;
use crate::models::ChatId;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use url::Url;

/// Pause after a failed poll before trying again.
const POLL_BACKOFF: Duration = Duration::from_secs(3);

/// An inbound user text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub chat_id: ChatId,
    pub text: String,
    /// Sender's first name, when the platform provides it.
    pub sender_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub from: Option<User>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Deserialize)]
pub struct User {
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: ChatId,
    text: &'a str,
}

#[derive(Serialize)]
struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

/// Bot API client.
#[derive(Debug, Clone)]
pub struct TelegramTransport {
    client: Client,
    base: Url,
}

impl TelegramTransport {
    /// `api_url` is the API root (e.g. `https://api.telegram.org`).
    pub fn new(api_url: &str, token: &str) -> Result<Self, AppError> {
        if token.trim().is_empty() {
            return Err(AppError::Config("bot token is empty".to_string()));
        }
        let base = Url::parse(api_url)?.join(&format!("./bot{}/", token.trim()))?;
        Ok(Self {
            client: Client::new(),
            base,
        })
    }

    async fn call<P, X>(&self, method: &str, payload: &P, timeout: Duration) -> Result<X, AppError>
    where
        P: Serialize + ?Sized,
        X: DeserializeOwned,
    {
        let url = self.base.join(method)?;
        let response: ApiResponse<X> = self
            .client
            .post(url)
            .timeout(timeout)
            .json(payload)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(AppError::Transport {
                code: response.error_code,
                description: response
                    .description
                    .unwrap_or_else(|| format!("{} failed", method)),
            });
        }
        response
            .result
            .ok_or_else(|| AppError::Http(format!("{} returned no result", method)))
    }

    /// Fetches pending updates, blocking up to `timeout_secs` on the server side.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, AppError> {
        let payload = GetUpdates {
            offset,
            timeout: timeout_secs,
            allowed_updates: ["message"],
        };
        self.call(
            "getUpdates",
            &payload,
            Duration::from_secs(timeout_secs + 10),
        )
        .await
    }

    /// Long-polls forever, forwarding text messages to `sink`. Returns when the sink closes.
    pub async fn poll(&self, timeout_secs: u64, sink: mpsc::Sender<Inbound>) {
        info!("Telegram polling started");
        let mut offset = None;
        loop {
            let updates = match self.get_updates(offset, timeout_secs).await {
                Ok(updates) => updates,
                Err(e) => {
                    error!("getUpdates failed: {}", e);
                    sleep(POLL_BACKOFF).await;
                    continue;
                }
            };

            for update in updates {
                offset = Some(update.update_id + 1);
                let Some(message) = update.message else { continue };
                let Some(text) = message.text else {
                    debug!(chat_id = message.chat.id, "Skipping non-text message");
                    continue;
                };
                let inbound = Inbound {
                    chat_id: message.chat.id,
                    text,
                    sender_name: message.from.and_then(|u| u.first_name),
                };
                if sink.send(inbound).await.is_err() {
                    warn!("Inbound channel closed, polling stopped");
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), AppError> {
        let payload = SendMessage { chat_id, text };
        self.call::<_, serde_json::Value>("sendMessage", &payload, Duration::from_secs(30))
            .await
            .inspect_err(|e| warn!(chat_id, "sendMessage failed: {}", e))?;
        Ok(())
    }
}
