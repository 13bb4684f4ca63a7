//! Minimal Telegram Bot API transport: long polling for incoming messages and
//! `sendMessage` for replies and reminder deliveries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::chat::ChatRouter;
use crate::error::{ReminderBotError, Result};
use crate::interfaces::notifier::NotificationGateway;

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);
const REQUEST_GRACE_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Serialize)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

pub struct TelegramClient {
    http: reqwest::Client,
    endpoint: String,
}

impl TelegramClient {
    pub fn new(token: &str, api_base_url: Option<&str>) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ReminderBotError::Config(
                "telegram bot token is empty".to_string(),
            ));
        }
        let base = api_base_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim_end_matches('/');
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ReminderBotError::Http(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: format!("{base}/bot{token}"),
        })
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}/{method}", self.endpoint))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| ReminderBotError::Http(format!("{method}: {e}")))?;
        let parsed: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| ReminderBotError::Http(format!("{method}: {e}")))?;
        if !parsed.ok {
            return Err(ReminderBotError::Http(format!(
                "{method}: {}",
                parsed
                    .description
                    .unwrap_or_else(|| "request rejected".to_string())
            )));
        }
        parsed
            .result
            .ok_or_else(|| ReminderBotError::Http(format!("{method}: missing result")))
    }

    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: ["message"],
        };
        self.call(
            "getUpdates",
            &request,
            Duration::from_secs(timeout_secs + REQUEST_GRACE_SECS),
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let request = SendMessageRequest { chat_id, text };
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                &request,
                Duration::from_secs(REQUEST_GRACE_SECS),
            )
            .await?;
        Ok(())
    }
}

/// Delivers reminders as private messages; a user's chat id equals their id.
pub struct TelegramNotifier {
    client: Arc<TelegramClient>,
}

impl TelegramNotifier {
    pub fn new(client: Arc<TelegramClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationGateway for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, user_id: i64, text: &str) -> Result<()> {
        self.client
            .send_message(user_id, text)
            .await
            .map_err(|e| ReminderBotError::Delivery(e.to_string()))
    }
}

/// Feeds incoming text messages to `router` until `shutdown` flips to true.
pub async fn run_polling(
    client: Arc<TelegramClient>,
    router: Arc<ChatRouter>,
    poll_timeout_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut offset: Option<i64> = None;
    tracing::info!("Telegram polling started");

    loop {
        let updates = tokio::select! {
            result = client.get_updates(offset, poll_timeout_secs) => result,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        };

        let updates = match updates {
            Ok(updates) => updates,
            Err(err) => {
                tracing::warn!(error = %err, "Telegram getUpdates failed");
                tokio::select! {
                    _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            let (Some(text), Some(from)) = (message.text.as_deref(), message.from.as_ref()) else {
                continue;
            };

            let reply = router.handle(from.id, text).await;
            if let Err(err) = client.send_message(message.chat.id, &reply).await {
                tracing::warn!(
                    user_id = from.id,
                    chat_id = message.chat.id,
                    error = %err,
                    "Failed to send Telegram reply"
                );
            }
        }
    }

    tracing::info!("Telegram polling stopped");
}
