//! Daily catalog sync scheduler
//!
//! An owned tokio task that sleeps until the configured local time of day and
//! then triggers an incremental sync through the [`SyncCoordinator`].

#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use chrono::{DateTime, Local, NaiveTime, TimeZone};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::sync_service::{SyncCoordinator, SyncOutcome, SyncTrigger};
use crate::domain::reconciliation::SyncMode;
use crate::infrastructure::config::SchedulerConfig;

/// Time until the next occurrence of `run_at` after `now`.
///
/// A `run_at` equal to the current time is scheduled for the next day.
pub fn next_run_delay<Tz: TimeZone>(now: &DateTime<Tz>, run_at: NaiveTime) -> Duration {
    let now = now.naive_local();
    let mut target = now.date().and_time(run_at);
    if target <= now {
        target += chrono::Duration::days(1);
    }
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

pub struct SyncScheduler {
    coordinator: Arc<SyncCoordinator>,
    run_at: NaiveTime,
    mode: SyncMode,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl SyncScheduler {
    pub fn new(coordinator: Arc<SyncCoordinator>, run_at: NaiveTime, mode: SyncMode) -> Self {
        Self {
            coordinator,
            run_at,
            mode,
            task: Mutex::new(None),
        }
    }

    pub fn from_config(coordinator: Arc<SyncCoordinator>, config: &SchedulerConfig) -> Result<Self> {
        Ok(Self::new(coordinator, config.run_at_time()?, config.mode))
    }

    /// Spawns the scheduling loop. Returns `false` when it is already running.
    pub async fn start(&self) -> bool {
        let mut task = self.task.lock().await;
        if task.is_some() {
            warn!("⚠️ Scheduler already running");
            return false;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.coordinator.clone(),
            self.run_at,
            self.mode,
            token.clone(),
        ));
        *task = Some((token, handle));
        info!("⏰ Scheduler started: daily {} sync at {}", self.mode, self.run_at.format("%H:%M"));
        true
    }

    /// Cancels the loop and waits for an in-flight run to finish
    pub async fn stop(&self) {
        let Some((token, handle)) = self.task.lock().await.take() else {
            return;
        };
        token.cancel();
        if let Err(e) = handle.await {
            error!("❌ Scheduler task ended abnormally: {}", e);
        }
        info!("🛑 Scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }
}

async fn run_loop(coordinator: Arc<SyncCoordinator>, run_at: NaiveTime, mode: SyncMode, token: CancellationToken) {
    loop {
        let delay = next_run_delay(&Local::now(), run_at);
        info!("⏰ Next scheduled sync in {} minutes", delay.as_secs() / 60);

        tokio::select! {
            () = token.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        match coordinator.trigger(mode, SyncTrigger::Scheduled).await {
            Ok(SyncOutcome::Completed(summary)) => info!(
                "✅ Scheduled sync done: {} created, {} updated, {} failed",
                summary.created, summary.updated, summary.failed
            ),
            Ok(SyncOutcome::Skipped) => warn!("⚠️ Scheduled sync skipped, a run was already in progress"),
            Err(e) => error!("❌ Scheduled sync failed: {}", e),
        }
    }
}
