//! Recurring poll scheduling
//!
//! Two states: Idle (no token, nothing armed) and Running (one background
//! loop re-running the monitor cycle). `start` runs the first cycle
//! synchronously, then spawns a sleep-rearm loop — the next cycle is only
//! armed after the previous one completes, so cycles never overlap and
//! the period drifts by the cycle's own execution time (acceptable at a
//! >= 60-minute cadence).
//!
//! Cancellation is a `watch` channel checked with a biased select before
//! every firing: once `stop` has been called, no further cycle starts. An
//! in-flight vendor call is not aborted; the cycle finishes and its
//! result is discarded by the token checks inside the monitor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::monitor::{CycleOutcome, Monitor};

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerStatus {
    Idle,
    Running,
}

impl SchedulerStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SchedulerStatus::Idle => "idle",
            SchedulerStatus::Running => "running",
        }
    }
}

struct RunningLoop {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns at most one background poll loop.
pub struct Scheduler {
    interval: Duration,
    // Held across start's first cycle: no second loop can be armed while
    // a start is still verifying the account
    slot: Mutex<Option<RunningLoop>>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            slot: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling. Cancels a previous loop, runs one cycle immediately,
    /// and arms the recurring loop only if that cycle wants to continue.
    pub async fn start(&self, monitor: Arc<Monitor>) -> SchedulerStatus {
        let mut slot = self.slot.lock().await;
        if let Some(previous) = slot.take() {
            let _ = previous.stop.send(true);
        }

        if !monitor.has_token().await {
            debug!("no token, scheduler stays idle");
            return SchedulerStatus::Idle;
        }

        if monitor.run_cycle().await == CycleOutcome::Stop {
            info!("first cycle stopped the loop, scheduler idle");
            return SchedulerStatus::Idle;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let interval = self.interval;
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    () = tokio::time::sleep(interval) => {}
                }
                if monitor.run_cycle().await == CycleOutcome::Stop {
                    break;
                }
            }
            debug!("poll loop exited");
        });

        *slot = Some(RunningLoop {
            stop: stop_tx,
            handle,
        });
        info!(interval_secs = interval.as_secs(), "poll loop armed");
        SchedulerStatus::Running
    }

    /// Cancel the pending firing. After this returns no further cycle will
    /// start; a cycle already in flight finishes on its own.
    pub async fn stop(&self) {
        if let Some(previous) = self.slot.lock().await.take() {
            let _ = previous.stop.send(true);
            info!("poll loop cancelled");
        }
    }

    /// Current state. A loop that stopped itself (token gone) reads Idle.
    pub async fn status(&self) -> SchedulerStatus {
        match &*self.slot.lock().await {
            Some(running) if !running.handle.is_finished() => SchedulerStatus::Running,
            _ => SchedulerStatus::Idle,
        }
    }
}
