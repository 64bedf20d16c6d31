//! Vendor API constants
//!
//! Fixed values of the public Leigod web API. These are not secrets — they
//! identify the web client the vendor expects. The actual secret (the
//! account token) lives in the client's session.

use std::time::Duration;

/// Base URL of the Leigod web API
pub const API_BASE_URL: &str = "https://webapi.leigod.com/api";

/// Account info endpoint (POST, form-encoded)
pub const INFO_PATH: &str = "/user/info";

/// Pause acceleration endpoint (POST, form-encoded)
pub const PAUSE_PATH: &str = "/user/pause";

/// Usage log endpoint (POST, form-encoded)
pub const USAGE_LOG_PATH: &str = "/user/time/log";

/// Vendor response code for success
pub const CODE_OK: i64 = 0;

/// Vendor response code for an invalid/expired account token
pub const CODE_TOKEN_INVALID: i64 = 400006;

/// `lang` form field sent with every request
pub const LANG: &str = "zh_CN";

/// `os_type` form field — 4 identifies the web client
pub const OS_TYPE: &str = "4";

/// `region_code` form field for the usage log endpoint
pub const REGION_CODE: &str = "1";

/// `src_channel` form field for the usage log endpoint
pub const SRC_CHANNEL: &str = "guanwang";

/// Format of the vendor's `pause_time`/`recover_time` timestamps
/// (naive local time, e.g. `2026-08-06 13:45:00`)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Browser user agent the vendor's web API expects
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/88.0.4324.96 Safari/537.36 \
    Edg/88.0.705.53";

/// Referer header matching the vendor's own web frontend
pub const REFERER: &str = "https://www.leigod.com/";

/// Per-request timeout for every vendor call. Failures surface to the
/// caller immediately; the scheduler's next interval is the retry path.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
