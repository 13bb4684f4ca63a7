use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{Config, NotifierConfig};
use crate::error::{ReminderBotError, Result};
use crate::interfaces::notifier::NotificationGateway;
use crate::telegram::{TelegramClient, TelegramNotifier};

const WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// Writes deliveries to the log. Useful when no transport is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationGateway for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, user_id: i64, text: &str) -> Result<()> {
        tracing::info!(user_id, text, "Reminder delivered to log");
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    user_id: i64,
    text: &'a str,
}

/// Posts `{"user_id", "text"}` to a fixed URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()
            .map_err(|e| ReminderBotError::Http(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }
}

#[async_trait]
impl NotificationGateway for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, user_id: i64, text: &str) -> Result<()> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { user_id, text });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ReminderBotError::Delivery(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReminderBotError::Delivery(format!(
                "webhook returned {status}: {body}"
            )));
        }
        Ok(())
    }
}

pub fn build_notifier(config: &Config) -> Result<Arc<dyn NotificationGateway>> {
    match config.effective_notifier() {
        NotifierConfig::Log => Ok(Arc::new(LogNotifier)),
        NotifierConfig::Webhook { url, token } => Ok(Arc::new(WebhookNotifier::new(url, token)?)),
        NotifierConfig::Telegram => {
            let token = config.telegram_token().ok_or_else(|| {
                ReminderBotError::Config("telegram notifier requires a bot token".to_string())
            })?;
            let client = TelegramClient::new(token, config.telegram.api_base_url.as_deref())?;
            Ok(Arc::new(TelegramNotifier::new(Arc::new(client))))
        }
    }
}
