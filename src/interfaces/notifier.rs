use async_trait::async_trait;

use crate::error::Result;

/// Pushes a message to a single user. Failures come back as
/// `ReminderBotError::Delivery` and never panic.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, user_id: i64, text: &str) -> Result<()>;
}
