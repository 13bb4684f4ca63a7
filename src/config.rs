use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ReminderBotError, Result};

pub const TELEGRAM_TOKEN_ENV: &str = "REMINDER_BOT_TELEGRAM_TOKEN";

const DEFAULT_POLL_SECONDS: u64 = 30;
const DEFAULT_SEND_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_TELEGRAM_POLL_TIMEOUT_SECONDS: u64 = 30;
const MAX_UTC_OFFSET_MINUTES: i32 = 24 * 60 - 1;
/// One week.
const MAX_BACKOFF_BASE_SECONDS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeliveryConfig {
    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: u64,
    #[serde(default = "default_send_timeout_seconds")]
    pub send_timeout_seconds: u64,
    /// Failed attempts after which a reminder is abandoned. `None` retries forever.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Base delay for exponential backoff between failed attempts. `None`
    /// retries on every poll cycle.
    #[serde(default)]
    pub backoff_base_seconds: Option<u64>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            poll_seconds: DEFAULT_POLL_SECONDS,
            send_timeout_seconds: DEFAULT_SEND_TIMEOUT_SECONDS,
            max_attempts: None,
            backoff_base_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TimeZoneConfig {
    /// Fixed offset from UTC. Absent means the host's local zone.
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifierConfig {
    Log,
    Webhook {
        url: String,
        #[serde(default)]
        token: Option<String>,
    },
    Telegram,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default = "default_telegram_poll_timeout_seconds")]
    pub poll_timeout_seconds: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base_url: None,
            poll_timeout_seconds: DEFAULT_TELEGRAM_POLL_TIMEOUT_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub timezone: TimeZoneConfig,
    /// Absent means Telegram when a bot token is configured, else the log.
    #[serde(default)]
    pub notifier: Option<NotifierConfig>,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

fn default_poll_seconds() -> u64 {
    DEFAULT_POLL_SECONDS
}

fn default_send_timeout_seconds() -> u64 {
    DEFAULT_SEND_TIMEOUT_SECONDS
}

fn default_telegram_poll_timeout_seconds() -> u64 {
    DEFAULT_TELEGRAM_POLL_TIMEOUT_SECONDS
}

impl Config {
    pub fn convention_defaults(db_path: &str) -> Self {
        Self {
            database: DatabaseConfig {
                sqlite_path: Some(db_path.to_string()),
            },
            ..Self::default()
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| ReminderBotError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            ReminderBotError::Config(format!(
                "failed to read config {}: {e}",
                path.to_string_lossy()
            ))
        })?;
        Self::from_json_str(&raw)
    }

    /// Loads `path` when it exists, otherwise falls back to defaults rooted at
    /// `db_path`. Environment overrides are applied either way.
    pub fn load_or_default(path: impl AsRef<Path>, db_path: &str) -> Result<Self> {
        let path = path.as_ref();
        let config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::info!(
                config_path = %path.to_string_lossy(),
                "No config file found; using defaults"
            );
            Self::convention_defaults(db_path)
        };
        config.apply_env_overrides().validate()
    }

    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var(TELEGRAM_TOKEN_ENV) {
            let token = token.trim();
            if !token.is_empty() {
                self.telegram.bot_token = Some(token.to_string());
            }
        }
        self
    }

    pub fn validate(self) -> Result<Self> {
        if self.delivery.poll_seconds == 0 {
            return Err(ReminderBotError::Config(
                "delivery.poll_seconds must be at least 1".to_string(),
            ));
        }
        if self.delivery.send_timeout_seconds == 0 {
            return Err(ReminderBotError::Config(
                "delivery.send_timeout_seconds must be at least 1".to_string(),
            ));
        }
        if self.delivery.max_attempts == Some(0) {
            return Err(ReminderBotError::Config(
                "delivery.max_attempts must be at least 1 when set".to_string(),
            ));
        }
        if let Some(offset) = self.timezone.utc_offset_minutes {
            if !(-MAX_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&offset) {
                return Err(ReminderBotError::Config(format!(
                    "timezone.utc_offset_minutes out of range: {offset}"
                )));
            }
        }
        if let Some(base) = self.delivery.backoff_base_seconds {
            if base > MAX_BACKOFF_BASE_SECONDS {
                return Err(ReminderBotError::Config(format!(
                    "delivery.backoff_base_seconds must be at most {MAX_BACKOFF_BASE_SECONDS}"
                )));
            }
        }
        if let Some(NotifierConfig::Webhook { url, .. }) = &self.notifier {
            if url.trim().is_empty() {
                return Err(ReminderBotError::Config(
                    "notifier.url is required for the webhook notifier".to_string(),
                ));
            }
        }
        if self.notifier == Some(NotifierConfig::Telegram) && self.telegram_token().is_none() {
            return Err(ReminderBotError::Config(format!(
                "telegram notifier requires telegram.bot_token or {TELEGRAM_TOKEN_ENV}"
            )));
        }
        Ok(self)
    }

    /// Reminders go out through the bot users chat with unless a notifier is
    /// set explicitly.
    pub fn effective_notifier(&self) -> NotifierConfig {
        match &self.notifier {
            Some(notifier) => notifier.clone(),
            None if self.telegram_token().is_some() => NotifierConfig::Telegram,
            None => NotifierConfig::Log,
        }
    }

    pub fn telegram_token(&self) -> Option<&str> {
        self.telegram
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    pub fn sqlite_path_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.database
            .sqlite_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .unwrap_or(fallback)
    }
}
