use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::interfaces::scheduler::ScheduledJob;

/// Runs each registered job on its own interval until stopped. A failing run
/// is logged and the job keeps its schedule.
pub struct Scheduler {
    jobs: Vec<Arc<dyn ScheduledJob>>,
    handles: Vec<JoinHandle<()>>,
    stop: Option<watch::Sender<bool>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            handles: Vec::new(),
            stop: None,
        }
    }

    pub fn register_job(&mut self, job: Arc<dyn ScheduledJob>) {
        self.jobs.push(job);
    }

    pub fn is_running(&self) -> bool {
        self.stop.is_some()
    }

    pub fn start(&mut self) {
        if self.stop.is_some() {
            return;
        }
        let (tx, rx) = watch::channel(false);
        self.stop = Some(tx);

        for job in &self.jobs {
            let job = Arc::clone(job);
            let mut rx = rx.clone();
            let handle = tokio::spawn(async move {
                let mut tick = tokio::time::interval(job.interval());
                tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
                tracing::info!(job = job.name(), interval = ?job.interval(), "Scheduled job started");
                loop {
                    tokio::select! {
                        _ = tick.tick() => {
                            if let Err(err) = job.run().await {
                                tracing::error!(job = job.name(), error = %err, "Scheduled job run failed");
                            }
                        }
                        changed = rx.changed() => {
                            if changed.is_err() || *rx.borrow() {
                                break;
                            }
                        }
                    }
                }
                tracing::info!(job = job.name(), "Scheduled job stopped");
            });
            self.handles.push(handle);
        }
    }

    /// Signals every job to stop and waits for in-flight runs to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(true);
        }
        let handles = std::mem::take(&mut self.handles);
        for handle in handles {
            let _ = handle.await;
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
