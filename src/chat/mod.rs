//! Chat command handling shared by every transport.
//!
//! A transport hands each incoming `(user_id, text)` to [`ChatRouter::handle`]
//! and sends back the returned reply. The router tracks where each user is in
//! the two-step `/remind` flow; the reminder data itself lives in
//! [`ReminderService`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::conversation_fsm::{transition, ConversationEvent, ConversationStep};
use crate::error::ReminderBotError;
use crate::reminders::Reminder;
use crate::services::reminders::ReminderService;

mod messages;
pub use messages::*;

const HUMAN_FORMAT: &str = "%d.%m %H:%M";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Info,
    Remind(Option<String>),
    List,
    Delete(Option<String>),
    Clear,
    Cancel,
    Unknown(String),
}

impl Command {
    /// `None` for plain text. Accepts Telegram's `/cmd@botname` form.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let body = text.strip_prefix('/')?;
        let (name, arg) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, Some(rest.trim().to_string())),
            None => (body, None),
        };
        let arg = arg.filter(|a| !a.is_empty());
        let name = name.split('@').next().unwrap_or(name).to_lowercase();

        Some(match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "info" => Command::Info,
            "remind" => Command::Remind(arg),
            "myreminders" => Command::List,
            "delreminder" => Command::Delete(arg),
            "clearreminders" => Command::Clear,
            "cancel" => Command::Cancel,
            _ => Command::Unknown(name),
        })
    }
}

pub struct ChatRouter {
    service: Arc<ReminderService>,
    steps: RwLock<HashMap<i64, ConversationStep>>,
}

impl ChatRouter {
    pub fn new(service: Arc<ReminderService>) -> Self {
        Self {
            service,
            steps: RwLock::new(HashMap::new()),
        }
    }

    pub fn service(&self) -> &Arc<ReminderService> {
        &self.service
    }

    pub async fn step(&self, user_id: i64) -> ConversationStep {
        self.steps
            .read()
            .await
            .get(&user_id)
            .copied()
            .unwrap_or_default()
    }

    async fn apply(&self, user_id: i64, event: ConversationEvent) {
        let mut steps = self.steps.write().await;
        let current = steps.get(&user_id).copied().unwrap_or_default();
        match transition(current, event) {
            Some(ConversationStep::Idle) => {
                steps.remove(&user_id);
            }
            Some(next) => {
                steps.insert(user_id, next);
            }
            None => {
                tracing::warn!(user_id, ?current, ?event, "Ignored out-of-order conversation event");
            }
        }
    }

    pub async fn handle(&self, user_id: i64, text: &str) -> String {
        if let Some(command) = Command::parse(text) {
            if self.step(user_id).await != ConversationStep::Idle {
                self.apply(user_id, ConversationEvent::Cancel).await;
                self.service.abandon_schedule(user_id).await;
            }
            return self.handle_command(user_id, command).await;
        }

        match self.step(user_id).await {
            ConversationStep::Idle => IDLE_HINT.to_string(),
            ConversationStep::AwaitingTime => self.handle_time(user_id, text).await,
            ConversationStep::AwaitingText => self.handle_text(user_id, text).await,
        }
    }

    async fn handle_command(&self, user_id: i64, command: Command) -> String {
        tracing::debug!(user_id, ?command, "Handling chat command");
        match command {
            Command::Start => START_TEXT.to_string(),
            Command::Help => HELP_TEXT.to_string(),
            Command::Info => INFO_TEXT.to_string(),
            Command::Remind(None) => {
                self.apply(user_id, ConversationEvent::BeginSchedule).await;
                ASK_TIME_TEXT.to_string()
            }
            Command::Remind(Some(time_text)) => {
                self.apply(user_id, ConversationEvent::BeginSchedule).await;
                self.handle_time(user_id, &time_text).await
            }
            Command::List => self.handle_list(user_id).await,
            Command::Delete(arg) => self.handle_delete(user_id, arg.as_deref()).await,
            Command::Clear => match self.service.clear_reminders(user_id).await {
                Ok(count) => format!("{CLEARED_TEXT} ({count})"),
                Err(err) => storage_failure(user_id, &err),
            },
            Command::Cancel => CANCELLED_TEXT.to_string(),
            Command::Unknown(name) => format!("Unknown command /{name}. {IDLE_HINT}"),
        }
    }

    async fn handle_time(&self, user_id: i64, text: &str) -> String {
        match self.service.stage_time(user_id, text).await {
            Ok(_) => {
                self.apply(user_id, ConversationEvent::TimeAccepted).await;
                ASK_TEXT_TEXT.to_string()
            }
            Err(err) => {
                tracing::debug!(user_id, error = %err, "Rejected reminder time");
                self.apply(user_id, ConversationEvent::TimeRejected).await;
                BAD_TIME_TEXT.to_string()
            }
        }
    }

    async fn handle_text(&self, user_id: i64, text: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            return ASK_TEXT_TEXT.to_string();
        }

        let result = self.service.commit_text(user_id, text).await;
        self.apply(user_id, ConversationEvent::TextReceived).await;
        match result {
            Ok(reminder) => saved_text(&reminder),
            Err(ReminderBotError::Session(_)) => SESSION_LOST_TEXT.to_string(),
            Err(err) => storage_failure(user_id, &err),
        }
    }

    async fn handle_list(&self, user_id: i64) -> String {
        match self.service.list_reminders(user_id).await {
            Ok(reminders) if reminders.is_empty() => NO_REMINDERS_TEXT.to_string(),
            Ok(reminders) => render_list(&reminders),
            Err(err) => storage_failure(user_id, &err),
        }
    }

    async fn handle_delete(&self, user_id: i64, arg: Option<&str>) -> String {
        let Some(id) = arg
            .filter(|a| !a.is_empty() && a.chars().all(|c| c.is_ascii_digit()))
            .and_then(|a| a.parse::<i64>().ok())
        else {
            return DELETE_USAGE_TEXT.to_string();
        };

        match self.service.delete_reminder(user_id, id).await {
            Ok(true) => format!("Okay, deleted reminder {id}"),
            Ok(false) => NOT_FOUND_TEXT.to_string(),
            Err(err) => storage_failure(user_id, &err),
        }
    }
}

fn saved_text(reminder: &Reminder) -> String {
    format!(
        "Okay, got it\nI'll remind you at {}: {}",
        reminder.scheduled_at.format(HUMAN_FORMAT),
        reminder.text
    )
}

fn render_list(reminders: &[Reminder]) -> String {
    let mut response = String::from("Your reminders:\n\n");
    for reminder in reminders {
        let status = if reminder.sent { "Done" } else { "Pending" };
        response.push_str(&format!(
            "{}. [{}] {} - {}\n",
            reminder.id,
            reminder.scheduled_at.format(HUMAN_FORMAT),
            reminder.text,
            status
        ));
    }
    response.push_str(LIST_FOOTER_TEXT);
    response
}

fn storage_failure(user_id: i64, err: &ReminderBotError) -> String {
    tracing::error!(user_id, error = %err, "Chat command failed");
    STORAGE_FAILURE_TEXT.to_string()
}
