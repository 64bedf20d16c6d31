//! Auto-pause decision policy
//!
//! Pure function from (state, elapsed minutes, thresholds) to an action.
//! Only an accelerating account can trigger anything; paused and
//! undetermined states never warn or pause regardless of elapsed time.

use crate::usage::InferredState;

/// Default for both thresholds: 24 hours of acceleration.
pub const DEFAULT_THRESHOLD_MINUTES: u64 = 1440;

/// Warning and pause thresholds, in minutes of continuous acceleration.
///
/// `pause_minutes` is conceptually >= `warning_minutes`; this is not
/// enforced here. With an inverted configuration the pause branch simply
/// wins before a warning is ever emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub warning_minutes: u64,
    pub pause_minutes: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning_minutes: DEFAULT_THRESHOLD_MINUTES,
            pause_minutes: DEFAULT_THRESHOLD_MINUTES,
        }
    }
}

/// What the cycle should do after a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do.
    None,
    /// Notify the operator; do not touch the account.
    Warn,
    /// Notify the operator and invoke the pause operation.
    Pause,
}

/// Decide the action for one poll.
pub fn decide(state: InferredState, elapsed_minutes: f64, thresholds: &Thresholds) -> Action {
    if state != InferredState::Accelerating {
        return Action::None;
    }
    if elapsed_minutes > thresholds.pause_minutes as f64 {
        Action::Pause
    } else if elapsed_minutes > thresholds.warning_minutes as f64 {
        Action::Warn
    } else {
        Action::None
    }
}
