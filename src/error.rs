use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReminderBotError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid time: {0}")]
    Parse(String),
    #[error("no pending schedule for user {0}")]
    Session(i64),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("delivery error: {0}")]
    Delivery(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl ReminderBotError {
    /// Errors the user can fix by sending a different message.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Session(_))
    }
}

pub use crate::Result;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failure_kind() {
        let err = ReminderBotError::Config("x".to_string());
        assert!(format!("{err}").contains("configuration error"));

        let err = ReminderBotError::Session(42);
        assert_eq!(err.to_string(), "no pending schedule for user 42");
    }

    #[test]
    fn only_user_input_errors_are_recoverable() {
        assert!(ReminderBotError::Parse("abc".to_string()).is_recoverable());
        assert!(ReminderBotError::Session(1).is_recoverable());
        assert!(!ReminderBotError::Storage("disk".to_string()).is_recoverable());
        assert!(!ReminderBotError::Delivery("offline".to_string()).is_recoverable());
    }
}
