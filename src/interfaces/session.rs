use async_trait::async_trait;
use chrono::NaiveDateTime;

/// Time captured by the first step of the schedule flow, waiting for the
/// reminder text. Holds at most one entry per user.
#[async_trait]
pub trait PendingScheduleStore: Send + Sync {
    /// Replaces any earlier pending entry for `user_id`.
    async fn stage(&self, user_id: i64, scheduled_at: NaiveDateTime);
    /// Removes and returns the pending entry.
    async fn take(&self, user_id: i64) -> Option<NaiveDateTime>;
    async fn peek(&self, user_id: i64) -> Option<NaiveDateTime>;
    async fn clear(&self, user_id: i64) -> bool;
}
