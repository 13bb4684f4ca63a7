use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::clock::Clock;
use crate::error::{ReminderBotError, Result};
use crate::interfaces::session::PendingScheduleStore;
use crate::reminders::{Reminder, ReminderStore};
use crate::time_resolver;

/// User-facing reminder operations. Transports call into this; it owns no
/// transport state besides the injected pending-schedule store.
pub struct ReminderService {
    store: Arc<ReminderStore>,
    sessions: Arc<dyn PendingScheduleStore>,
    clock: Arc<dyn Clock>,
}

impl ReminderService {
    pub fn new(
        store: Arc<ReminderStore>,
        sessions: Arc<dyn PendingScheduleStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            sessions,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<ReminderStore> {
        &self.store
    }

    /// First step of the schedule flow. On a parse error nothing is staged
    /// and any earlier pending entry is left as it was.
    pub async fn stage_time(&self, user_id: i64, time_text: &str) -> Result<NaiveDateTime> {
        let scheduled_at = time_resolver::resolve(self.clock.now(), time_text)?;
        self.sessions.stage(user_id, scheduled_at).await;
        tracing::debug!(user_id, %scheduled_at, "Staged reminder time");
        Ok(scheduled_at)
    }

    /// Second step of the schedule flow. The pending entry is consumed
    /// whether or not the insert succeeds.
    pub async fn commit_text(&self, user_id: i64, body_text: &str) -> Result<Reminder> {
        let scheduled_at = self
            .sessions
            .take(user_id)
            .await
            .ok_or(ReminderBotError::Session(user_id))?;

        let reminder = self
            .store
            .create(user_id, scheduled_at, body_text.trim())
            .await
            .inspect_err(|err| {
                tracing::error!(user_id, error = %err, "Failed to store reminder");
            })?;
        tracing::info!(
            reminder_id = reminder.id,
            user_id,
            scheduled_at = %reminder.scheduled_at,
            "Created reminder"
        );
        Ok(reminder)
    }

    pub async fn pending_schedule(&self, user_id: i64) -> Option<NaiveDateTime> {
        self.sessions.peek(user_id).await
    }

    pub async fn abandon_schedule(&self, user_id: i64) -> bool {
        self.sessions.clear(user_id).await
    }

    /// Both steps in one call. Leaves any chat flow the user has open alone.
    pub async fn schedule_reminder(
        &self,
        user_id: i64,
        time_text: &str,
        body_text: &str,
    ) -> Result<Reminder> {
        let scheduled_at = time_resolver::resolve(self.clock.now(), time_text)?;
        let reminder = self
            .store
            .create(user_id, scheduled_at, body_text.trim())
            .await?;
        tracing::info!(
            reminder_id = reminder.id,
            user_id,
            scheduled_at = %reminder.scheduled_at,
            "Created reminder"
        );
        Ok(reminder)
    }

    pub async fn list_reminders(&self, user_id: i64) -> Result<Vec<Reminder>> {
        self.store.list_by_user(user_id).await
    }

    pub async fn delete_reminder(&self, user_id: i64, id: i64) -> Result<bool> {
        let deleted = self.store.delete_by_id(id, user_id).await?;
        if deleted {
            tracing::info!(reminder_id = id, user_id, "Deleted reminder");
        }
        Ok(deleted)
    }

    pub async fn clear_reminders(&self, user_id: i64) -> Result<usize> {
        let count = self.store.delete_all_by_user(user_id).await?;
        tracing::info!(user_id, count, "Cleared reminders");
        Ok(count)
    }
}
