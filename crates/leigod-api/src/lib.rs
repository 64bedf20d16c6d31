//! Leigod account API client
//!
//! Typed wrappers over the three vendor endpoints (account info, pause,
//! usage log) and the session token lifecycle. This crate is a standalone
//! library with no dependency on the control-panel binary — it can be
//! tested and used independently.
//!
//! Token lifecycle:
//! 1. Operator submits a token via `AccountClient::update_token()`
//! 2. The client verifies it against `/user/info` and caches the account
//! 3. The monitor loop calls `fetch_usage_log()` each cycle
//! 4. Vendor code 400006 (or any info-fetch failure) clears the token
//! 5. With the token cleared, every call fails `InvalidToken` without a
//!    vendor request until the operator submits a new one

pub mod client;
pub mod constants;
pub mod error;
pub mod types;

pub use client::{AccountClient, build_http_client};
pub use constants::*;
pub use error::{Error, Result};
pub use types::{AccountInfo, ApiEnvelope, UsageLogData, UsageRecord};
