pub mod chat;
pub mod clock;
pub mod config;
pub mod conversation_fsm;
pub mod daemon;
pub mod db;
pub mod delivery;
pub mod error;
pub mod interfaces;
pub mod logging;
pub mod notifiers;
pub mod reminders;
pub mod runtime_paths;
pub mod scheduler;
pub mod services;
pub mod session;
pub mod telegram;
pub mod time_resolver;

pub type Result<T> = std::result::Result<T, error::ReminderBotError>;
