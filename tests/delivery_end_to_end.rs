use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use tempfile::tempdir;

use reminder_bot::clock::FixedClock;
use reminder_bot::delivery::DeliveryJob;
use reminder_bot::error::{ReminderBotError, Result};
use reminder_bot::interfaces::notifier::NotificationGateway;
use reminder_bot::reminders::ReminderStore;

struct RecordingGateway {
    sent: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, user_id: i64, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push((user_id, text.to_string()));
        Ok(())
    }
}

struct BrokenGateway {
    calls: AtomicUsize,
}

#[async_trait]
impl NotificationGateway for BrokenGateway {
    fn name(&self) -> &str {
        "broken"
    }

    async fn send(&self, _user_id: i64, _text: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ReminderBotError::Delivery("recipient unreachable".to_string()))
    }
}

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 19)
        .unwrap()
        .and_hms_opt(14, 5, 0)
        .unwrap()
}

#[tokio::test]
async fn due_reminder_is_delivered_and_marked_sent() {
    let temp = tempdir().unwrap();
    let db_path = temp.path().join("e2e.db").to_string_lossy().to_string();
    let store = Arc::new(ReminderStore::new(&db_path).await.unwrap());
    let clock = Arc::new(FixedClock::new(now()));
    let gateway = Arc::new(RecordingGateway {
        sent: Mutex::new(Vec::new()),
    });

    let reminder = store
        .create(77, now() - Duration::minutes(1), "take out the bins")
        .await
        .unwrap();
    let due = store.find_due(now()).await.unwrap();
    assert_eq!(due.iter().map(|r| r.id).collect::<Vec<_>>(), vec![reminder.id]);

    let job = DeliveryJob::new(store.clone(), gateway.clone(), clock);
    let report = job.run_cycle().await.unwrap();
    assert_eq!(report.delivered, 1);

    let stored = store.get(reminder.id, 77).await.unwrap().unwrap();
    assert!(stored.sent);
    assert!(store.find_due(now()).await.unwrap().is_empty());

    let sent = gateway.sent.lock().unwrap().clone();
    assert_eq!(
        sent,
        vec![(
            77,
            "Reminder: take out the bins - 2026-10-19 14:04".to_string()
        )]
    );
}

#[tokio::test]
async fn failed_delivery_stays_due_for_the_next_cycle() {
    let temp = tempdir().unwrap();
    let db_path = temp.path().join("e2e-fail.db").to_string_lossy().to_string();
    let store = Arc::new(ReminderStore::new(&db_path).await.unwrap());
    let clock = Arc::new(FixedClock::new(now()));
    let gateway = Arc::new(BrokenGateway {
        calls: AtomicUsize::new(0),
    });

    let reminder = store
        .create(77, now() - Duration::minutes(1), "call the dentist")
        .await
        .unwrap();

    let job = DeliveryJob::new(store.clone(), gateway.clone(), clock.clone());
    let report = job.run_cycle().await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(!store.get(reminder.id, 77).await.unwrap().unwrap().sent);

    clock.advance(Duration::seconds(30));
    let due = store.find_due(now() + Duration::seconds(30)).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, reminder.id);

    job.run_cycle().await.unwrap();
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
    assert!(!store.get(reminder.id, 77).await.unwrap().unwrap().sent);
}

#[tokio::test]
async fn reminders_survive_a_restart() {
    let temp = tempdir().unwrap();
    let db_path = temp.path().join("restart.db").to_string_lossy().to_string();

    let id = {
        let store = ReminderStore::new(&db_path).await.unwrap();
        store
            .create(5, now() - Duration::minutes(3), "stretch")
            .await
            .unwrap()
            .id
    };

    let store = Arc::new(ReminderStore::new(&db_path).await.unwrap());
    let gateway = Arc::new(RecordingGateway {
        sent: Mutex::new(Vec::new()),
    });
    let job = DeliveryJob::new(store.clone(), gateway.clone(), Arc::new(FixedClock::new(now())));
    job.run_cycle().await.unwrap();

    assert!(store.get(id, 5).await.unwrap().unwrap().sent);
    assert_eq!(gateway.sent.lock().unwrap().len(), 1);
}
