//! Usage-log interpretation
//!
//! Derives the account's current state from the newest usage record. The
//! vendor's log is ambiguous: records carry optional pause/recover
//! timestamps in a fixed local-time format, newest first, and only the
//! first record reflects the latest action. Interpretation never fails —
//! absence or ambiguity degrades to `Undetermined`, and the caller's
//! tracker keeps the last determinate value across such reads.
//!
//! The typed `InferredState` is the primary output; `message` is a purely
//! cosmetic operator string. Nothing downstream branches on message text.

use chrono::NaiveDateTime;
use leigod_api::{TIMESTAMP_FORMAT, UsageLogData, UsageRecord};
use serde::Serialize;

/// Account state derived from the usage log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InferredState {
    Paused,
    Accelerating,
    /// The log was empty or the newest record was not interpretable.
    /// Never overwrites a previously known determinate state.
    Undetermined,
}

impl InferredState {
    /// Status label for health output and logging.
    pub fn label(&self) -> &'static str {
        match self {
            InferredState::Paused => "paused",
            InferredState::Accelerating => "accelerating",
            InferredState::Undetermined => "undetermined",
        }
    }
}

/// Outcome of one usage poll. Transient — consumed by the policy step of
/// the same cycle, never persisted.
#[derive(Debug, Clone)]
pub struct PollResult {
    pub success: bool,
    pub message: String,
    pub elapsed_minutes: f64,
    pub records: Vec<UsageRecord>,
    pub state: InferredState,
}

impl PollResult {
    /// Result for a cycle whose fetch failed outright.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            elapsed_minutes: 0.0,
            records: Vec::new(),
            state: InferredState::Undetermined,
        }
    }
}

/// Interpret a usage-log page as of `now` (naive local time, matching the
/// vendor's timestamp format).
///
/// The newest record decides: a record whose pause timestamp is present
/// and not older than its recover timestamp means the last action was a
/// pause (equal timestamps count as paused). Otherwise the account is
/// accelerating since its recover timestamp, and the elapsed time is
/// clamped to zero when clock skew puts that timestamp in the future.
pub fn interpret(data: UsageLogData, now: NaiveDateTime) -> PollResult {
    let Some(latest) = data.list.first() else {
        return PollResult {
            success: true,
            message: "no usage data for this account yet".into(),
            elapsed_minutes: 0.0,
            records: data.list,
            state: InferredState::Undetermined,
        };
    };

    let last_action_was_pause = match (&latest.pause_time, &latest.recover_time) {
        (Some(_), None) => true,
        // Fixed-format timestamps compare chronologically as strings
        (Some(pause), Some(recover)) => pause.as_str() >= recover.as_str(),
        (None, _) => false,
    };

    if last_action_was_pause {
        return PollResult {
            success: true,
            message: "account is currently paused, nothing to do".into(),
            elapsed_minutes: 0.0,
            records: data.list,
            state: InferredState::Paused,
        };
    }

    let (state, elapsed_minutes, message) = match &latest.recover_time {
        Some(recover_time) => match NaiveDateTime::parse_from_str(recover_time, TIMESTAMP_FORMAT) {
            Ok(recovered_at) => {
                let elapsed = (now - recovered_at).num_seconds() as f64 / 60.0;
                // Vendor clock ahead of ours: treat as just resumed
                let elapsed = elapsed.max(0.0);
                (
                    InferredState::Accelerating,
                    elapsed,
                    format!("account is accelerating, {elapsed:.2} minutes since recovery"),
                )
            }
            Err(_) => (
                InferredState::Undetermined,
                0.0,
                format!("latest record has an unparseable recover time: {recover_time}"),
            ),
        },
        None => (
            InferredState::Undetermined,
            0.0,
            "latest record is a recovery but carries no recover time".into(),
        ),
    };

    PollResult {
        success: true,
        message,
        elapsed_minutes,
        records: data.list,
        state,
    }
}
