//! The check-decide-act cycle
//!
//! `Monitor` wires the account client, interpreter, tracker, policy and
//! notifier together. One `run_cycle` call is one poll: fetch the usage
//! log, interpret it, feed the tracker, apply the policy. The scheduler
//! re-runs it on an interval; the control panel calls the operator entry
//! points (`set_token`, `manual_pause`, `reset`) on the same instance.
//!
//! Failure policy: only an authentication failure stops the loop (the
//! token is gone, polling is pointless). Every other failure is logged,
//! counted, and retried on the next scheduled cycle. The operator-facing
//! snapshot is written only by determinate outcomes, so a transient error
//! can never replace the last known good status.

use std::sync::Arc;

use chrono::Local;
use leigod_api::{AccountClient, AccountInfo, TIMESTAMP_FORMAT};
use notify::Notify;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::policy::{Action, Thresholds, decide};
use crate::tracker::{StateTracker, Transition};
use crate::usage::{InferredState, PollResult, interpret};

/// Title used for every operator push message.
const NOTIFY_TITLE: &str = "Leigod auto-pause";

/// Tags attached to every operator push message.
const NOTIFY_TAGS: &str = "leigod";

/// Usage-log page size per poll. The newest record decides the state; the
/// rest are kept for the panel.
const USAGE_PAGE_SIZE: u32 = 5;

/// Whether the poll loop should keep running after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Continue,
    /// Token gone (cleared, expired, or never set): transition to Idle.
    Stop,
}

/// Operator-facing view of the latest determinate poll.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub message: String,
    pub state: InferredState,
    pub elapsed_minutes: f64,
    /// Local time of the poll that produced this snapshot.
    pub updated_at: Option<String>,
    pub records: Vec<leigod_api::UsageRecord>,
}

impl StatusSnapshot {
    fn initial() -> Self {
        Self {
            message: "no account token configured".into(),
            state: InferredState::Undetermined,
            elapsed_minutes: 0.0,
            updated_at: None,
            records: Vec::new(),
        }
    }
}

/// One account's monitoring state and the cycle that drives it.
pub struct Monitor {
    client: Arc<AccountClient>,
    notifier: Arc<dyn Notify>,
    thresholds: Thresholds,
    tracker: Mutex<StateTracker>,
    status: Mutex<StatusSnapshot>,
}

impl Monitor {
    pub fn new(
        client: Arc<AccountClient>,
        notifier: Arc<dyn Notify>,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            client,
            notifier,
            thresholds,
            tracker: Mutex::new(StateTracker::new()),
            status: Mutex::new(StatusSnapshot::initial()),
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn client(&self) -> &Arc<AccountClient> {
        &self.client
    }

    /// Whether a token is currently held.
    pub async fn has_token(&self) -> bool {
        self.client.has_token().await
    }

    /// Last determinate pause flag, if any.
    pub async fn last_known_paused(&self) -> Option<bool> {
        self.tracker.lock().await.last_known_paused()
    }

    /// Latest operator-facing snapshot.
    pub async fn status(&self) -> StatusSnapshot {
        self.status.lock().await.clone()
    }

    /// Replace the account token and verify it.
    ///
    /// On success the tracker is seeded from the vendor's own pause flag,
    /// so the very first poll can already detect an external resume. On
    /// failure the client has cleared the token and the tracker forgets.
    pub async fn set_token(&self, token: &str) -> leigod_api::Result<AccountInfo> {
        match self.client.update_token(token).await {
            Ok(account) => {
                self.tracker.lock().await.seed(account.is_paused());
                let mut status = self.status.lock().await;
                status.state = if account.is_paused() {
                    InferredState::Paused
                } else {
                    InferredState::Accelerating
                };
                status.elapsed_minutes = 0.0;
                status.message = format!(
                    "token verified, account {} is {}",
                    account.nickname,
                    status.state.label()
                );
                status.updated_at = Some(local_now_string());
                Ok(account)
            }
            Err(e) => {
                self.tracker.lock().await.reset();
                Err(e)
            }
        }
    }

    /// Operator-triggered pause.
    ///
    /// Re-verifies the token first (fail-closed: a stale token is cleared
    /// here rather than producing a confusing pause failure), pauses, then
    /// refreshes the snapshot with a fresh poll so the panel shows the
    /// result immediately.
    pub async fn manual_pause(&self) -> leigod_api::Result<String> {
        self.client.fetch_account_info().await?;
        let message = self.client.pause().await?;
        self.tracker.lock().await.record_pause();
        metrics::counter!("autopause_pause_actions_total", "trigger" => "manual", "result" => "ok")
            .increment(1);

        if let Ok(data) = self.client.fetch_usage_log(1, USAGE_PAGE_SIZE).await {
            let result = interpret(data, Local::now().naive_local());
            self.apply_snapshot(&result).await;
        }
        Ok(message)
    }

    /// Forget the session, tracker state and snapshot (operator reset).
    pub async fn reset(&self) {
        self.client.clear().await;
        self.tracker.lock().await.reset();
        *self.status.lock().await = StatusSnapshot::initial();
    }

    /// One check-decide-act cycle.
    pub async fn run_cycle(&self) -> CycleOutcome {
        if !self.client.has_token().await {
            debug!("no token held, poll loop going idle");
            return CycleOutcome::Stop;
        }

        let data = match self.client.fetch_usage_log(1, USAGE_PAGE_SIZE).await {
            Ok(data) => data,
            Err(e) if e.is_auth() => {
                warn!(error = %e, "token invalidated during poll, going idle");
                metrics::counter!("autopause_poll_cycles_total", "outcome" => "auth_invalid")
                    .increment(1);
                return CycleOutcome::Stop;
            }
            Err(e) => {
                warn!(error = %e, "usage poll failed, retrying next cycle");
                metrics::counter!("autopause_poll_cycles_total", "outcome" => "error").increment(1);
                return CycleOutcome::Continue;
            }
        };

        let result = interpret(data, Local::now().naive_local());
        debug!(
            state = result.state.label(),
            elapsed_minutes = result.elapsed_minutes,
            "usage poll interpreted"
        );
        self.apply_snapshot(&result).await;

        let transition = self.tracker.lock().await.observe(result.state);
        if transition == Some(Transition::ExternallyResumed) {
            info!("acceleration resumed without an action from this service");
            metrics::counter!("autopause_notifications_total", "kind" => "resumed").increment(1);
            self.notifier
                .notify(
                    NOTIFY_TITLE,
                    "Acceleration was resumed outside this service; the usage timer is running.",
                    NOTIFY_TAGS,
                )
                .await;
        }

        match decide(result.state, result.elapsed_minutes, &self.thresholds) {
            Action::None => {}
            Action::Warn => {
                info!(
                    elapsed_minutes = result.elapsed_minutes,
                    warning_minutes = self.thresholds.warning_minutes,
                    "usage past warning threshold"
                );
                metrics::counter!("autopause_notifications_total", "kind" => "warning")
                    .increment(1);
                self.notifier
                    .notify(
                        NOTIFY_TITLE,
                        &format!(
                            "Account has been accelerating for {:.2} minutes (warning threshold {} minutes).",
                            result.elapsed_minutes, self.thresholds.warning_minutes
                        ),
                        NOTIFY_TAGS,
                    )
                    .await;
            }
            Action::Pause => {
                info!(
                    elapsed_minutes = result.elapsed_minutes,
                    pause_minutes = self.thresholds.pause_minutes,
                    "usage past pause threshold, pausing"
                );
                metrics::counter!("autopause_notifications_total", "kind" => "auto_pause")
                    .increment(1);
                self.notifier
                    .notify(
                        NOTIFY_TITLE,
                        &format!(
                            "Account accelerating for {:.2} minutes exceeds the {}-minute limit, pausing now.",
                            result.elapsed_minutes, self.thresholds.pause_minutes
                        ),
                        NOTIFY_TAGS,
                    )
                    .await;

                match self.client.pause().await {
                    Ok(_) => {
                        self.tracker.lock().await.record_pause();
                        metrics::counter!("autopause_pause_actions_total", "trigger" => "auto", "result" => "ok")
                            .increment(1);
                    }
                    Err(leigod_api::Error::AlreadyPaused) => {
                        // Cached flag beat the poll; the next cycle's
                        // determinate state settles it
                        debug!("pause skipped, local cache already says paused");
                    }
                    Err(e) if e.is_auth() => {
                        warn!(error = %e, "pause rejected, token invalidated, going idle");
                        metrics::counter!("autopause_pause_actions_total", "trigger" => "auto", "result" => "auth_invalid")
                            .increment(1);
                        return CycleOutcome::Stop;
                    }
                    Err(e) => {
                        warn!(error = %e, "auto-pause failed, retrying next cycle");
                        metrics::counter!("autopause_pause_actions_total", "trigger" => "auto", "result" => "error")
                            .increment(1);
                    }
                }
            }
        }

        metrics::counter!("autopause_poll_cycles_total", "outcome" => "ok").increment(1);
        CycleOutcome::Continue
    }

    /// Write a determinate poll into the snapshot. Undetermined results
    /// keep the previous message so the panel never regresses to an
    /// anomaly string while the last known state is still the best answer.
    async fn apply_snapshot(&self, result: &PollResult) {
        let mut status = self.status.lock().await;
        if result.state == InferredState::Undetermined && status.updated_at.is_some() {
            status.records = result.records.clone();
            return;
        }
        status.message = result.message.clone();
        status.state = result.state;
        status.elapsed_minutes = result.elapsed_minutes;
        status.updated_at = Some(local_now_string());
        status.records = result.records.clone();
    }
}

fn local_now_string() -> String {
    Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string()
}
