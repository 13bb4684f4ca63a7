use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::Mutex;

use crate::clock::{truncate_to_minute, Clock};
use crate::config::DeliveryConfig;
use crate::error::{ReminderBotError, Result};
use crate::interfaces::notifier::NotificationGateway;
use crate::interfaces::scheduler::ScheduledJob;
use crate::reminders::{format_scheduled_at, Reminder, ReminderStore};

const MAX_BACKOFF_DOUBLINGS: u32 = 16;

pub fn render_notification(reminder: &Reminder) -> String {
    format!(
        "Reminder: {} - {}",
        reminder.text,
        format_scheduled_at(&reminder.scheduled_at)
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub backoff_base: Option<Duration>,
}

impl RetryPolicy {
    /// Retry on every cycle, forever.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff_base: config.backoff_base_seconds.map(Duration::from_secs),
        }
    }

    fn delay_after(&self, attempts: u32) -> Option<chrono::Duration> {
        let base = self.backoff_base?;
        let doublings = attempts.saturating_sub(1).min(MAX_BACKOFF_DOUBLINGS);
        let delay = base.saturating_mul(1u32 << doublings);
        Some(chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX))
    }

    fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub due: usize,
    pub delivered: usize,
    pub failed: usize,
    pub deferred: usize,
    pub abandoned: usize,
}

#[derive(Debug, Clone, Copy)]
struct FailureState {
    attempts: u32,
    retry_after: Option<NaiveDateTime>,
}

/// Polls for due reminders and hands each to the gateway, one at a time.
pub struct DeliveryJob {
    store: Arc<ReminderStore>,
    gateway: Arc<dyn NotificationGateway>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    send_timeout: Duration,
    retry: RetryPolicy,
    failures: Mutex<HashMap<i64, FailureState>>,
}

impl DeliveryJob {
    pub fn new(
        store: Arc<ReminderStore>,
        gateway: Arc<dyn NotificationGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let defaults = DeliveryConfig::default();
        Self {
            store,
            gateway,
            clock,
            interval: Duration::from_secs(defaults.poll_seconds),
            send_timeout: Duration::from_secs(defaults.send_timeout_seconds),
            retry: RetryPolicy::unbounded(),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(
        store: Arc<ReminderStore>,
        gateway: Arc<dyn NotificationGateway>,
        clock: Arc<dyn Clock>,
        config: &DeliveryConfig,
    ) -> Self {
        Self::new(store, gateway, clock)
            .with_interval(Duration::from_secs(config.poll_seconds.max(1)))
            .with_send_timeout(Duration::from_secs(config.send_timeout_seconds.max(1)))
            .with_retry_policy(RetryPolicy::from_config(config))
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// One poll: deliver everything due as of the current minute.
    pub async fn run_cycle(&self) -> Result<DeliveryReport> {
        let now = self.clock.now();
        let as_of = truncate_to_minute(now);
        let due = self.store.find_due(as_of).await?;
        let mut report = DeliveryReport {
            due: due.len(),
            ..DeliveryReport::default()
        };

        let mut failures = self.failures.lock().await;
        let due_ids: HashSet<i64> = due.iter().map(|r| r.id).collect();
        failures.retain(|id, _| due_ids.contains(id));

        for reminder in &due {
            if let Some(retry_after) = failures.get(&reminder.id).and_then(|f| f.retry_after) {
                if now < retry_after {
                    report.deferred += 1;
                    continue;
                }
            }

            match self.deliver(reminder).await {
                Ok(()) => {
                    failures.remove(&reminder.id);
                    report.delivered += 1;
                    self.mark_sent(reminder).await;
                }
                Err(err) => {
                    report.failed += 1;
                    let state = failures.entry(reminder.id).or_insert(FailureState {
                        attempts: 0,
                        retry_after: None,
                    });
                    state.attempts += 1;
                    state.retry_after = self
                        .retry
                        .delay_after(state.attempts)
                        .map(|delay| now.checked_add_signed(delay).unwrap_or(NaiveDateTime::MAX));
                    tracing::warn!(
                        reminder_id = reminder.id,
                        user_id = reminder.user_id,
                        attempts = state.attempts,
                        error = %err,
                        "Reminder delivery failed"
                    );

                    if self.retry.exhausted(state.attempts) {
                        tracing::error!(
                            reminder_id = reminder.id,
                            user_id = reminder.user_id,
                            attempts = state.attempts,
                            "Giving up on reminder after repeated delivery failures"
                        );
                        failures.remove(&reminder.id);
                        report.abandoned += 1;
                        self.mark_sent(reminder).await;
                    }
                }
            }
        }

        if report.due > 0 {
            tracing::info!(
                due = report.due,
                delivered = report.delivered,
                failed = report.failed,
                deferred = report.deferred,
                abandoned = report.abandoned,
                "Reminder delivery cycle finished"
            );
        }
        Ok(report)
    }

    async fn deliver(&self, reminder: &Reminder) -> Result<()> {
        let text = render_notification(reminder);
        match tokio::time::timeout(
            self.send_timeout,
            self.gateway.send(reminder.user_id, &text),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ReminderBotError::Delivery(format!(
                "{} gateway timed out after {:?}",
                self.gateway.name(),
                self.send_timeout
            ))),
        }
    }

    // A failure here means the reminder may be sent again next cycle.
    async fn mark_sent(&self, reminder: &Reminder) {
        match self.store.mark_sent(reminder.id).await {
            Ok(true) => {
                tracing::debug!(reminder_id = reminder.id, "Marked reminder sent");
            }
            Ok(false) => {
                tracing::debug!(
                    reminder_id = reminder.id,
                    "Reminder already sent or deleted before it could be marked"
                );
            }
            Err(err) => {
                tracing::error!(
                    reminder_id = reminder.id,
                    error = %err,
                    "Failed to mark reminder sent"
                );
            }
        }
    }
}

#[async_trait]
impl ScheduledJob for DeliveryJob {
    fn name(&self) -> &str {
        "reminder_delivery"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<()> {
        self.run_cycle().await.map(|_| ())
    }
}
