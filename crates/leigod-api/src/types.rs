//! Vendor wire types
//!
//! Every endpoint answers with the same envelope `{code, msg, data}`.
//! `code` 0 is success; the meaning of non-zero codes depends on the
//! endpoint (see `client`). Unknown fields are ignored — the vendor adds
//! and removes fields between web client releases.

use serde::{Deserialize, Serialize};

/// Response envelope shared by all vendor endpoints.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

/// Account data from `/user/info`.
///
/// `pause_status_id` 1 means the account is currently paused;
/// `pause_status` is the vendor's human-readable label for the same fact
/// and is display-only — state decisions use the id.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub pause_status: String,
    #[serde(default)]
    pub pause_status_id: i64,
}

impl AccountInfo {
    /// Whether the vendor reports the account as paused.
    pub fn is_paused(&self) -> bool {
        self.pause_status_id == 1
    }
}

/// One entry of the usage log, newest first.
///
/// A record describes one pause/recover pair. Either timestamp may be
/// absent. `duration` is derived at fetch time from the vendor's
/// `reduce_pause_time` field (0 when absent) so downstream consumers see
/// a stable field name.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UsageRecord {
    #[serde(default)]
    pub pause_time: Option<String>,
    #[serde(default)]
    pub recover_time: Option<String>,
    #[serde(default)]
    pub reduce_pause_time: Option<i64>,
    #[serde(skip_deserializing, default)]
    pub duration: i64,
}

/// Usage log payload from `/user/time/log`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UsageLogData {
    #[serde(default)]
    pub list: Vec<UsageRecord>,
}
