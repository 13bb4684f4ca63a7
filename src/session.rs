use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::RwLock;

use crate::interfaces::session::PendingScheduleStore;

/// Process-local pending schedules. Lost on restart, which the text step
/// reports as a session error.
#[derive(Default)]
pub struct InMemoryPendingSchedules {
    pending: RwLock<HashMap<i64, NaiveDateTime>>,
}

impl InMemoryPendingSchedules {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.pending.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.read().await.is_empty()
    }
}

#[async_trait]
impl PendingScheduleStore for InMemoryPendingSchedules {
    async fn stage(&self, user_id: i64, scheduled_at: NaiveDateTime) {
        let previous = self.pending.write().await.insert(user_id, scheduled_at);
        if let Some(previous) = previous {
            tracing::debug!(user_id, %previous, "Replaced pending schedule");
        }
    }

    async fn take(&self, user_id: i64) -> Option<NaiveDateTime> {
        self.pending.write().await.remove(&user_id)
    }

    async fn peek(&self, user_id: i64) -> Option<NaiveDateTime> {
        self.pending.read().await.get(&user_id).copied()
    }

    async fn clear(&self, user_id: i64) -> bool {
        self.pending.write().await.remove(&user_id).is_some()
    }
}
