//! Account client: session token lifecycle and the three vendor calls
//!
//! The client owns the session (token, cached account info, cached pause
//! flag) behind a `tokio::sync::RwLock`; the scheduler cycle and the
//! control-panel handlers share one instance via `Arc`.
//!
//! Token-clearing rules, in full:
//! - `fetch_account_info` clears the token on *any* failure (transport,
//!   parse, or non-zero vendor code). A stale or revoked token must not be
//!   silently retried forever.
//! - `pause` and `fetch_usage_log` clear the token only on vendor code
//!   400006; every other failure is transient and the token is retained.

use std::sync::Arc;

use common::Secret;
use notify::Notify;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::constants::{
    API_BASE_URL, CODE_OK, CODE_TOKEN_INVALID, INFO_PATH, LANG, OS_TYPE, PAUSE_PATH, REGION_CODE,
    REQUEST_TIMEOUT, SRC_CHANNEL, USAGE_LOG_PATH,
};
use crate::error::{Error, Result};
use crate::types::{AccountInfo, ApiEnvelope, UsageLogData};

/// Build the shared HTTP client with the vendor's expected browser headers
/// and the per-request timeout applied to every call.
pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(crate::constants::USER_AGENT));
    headers.insert(REFERER, HeaderValue::from_static(crate::constants::REFERER));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
    );
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(REQUEST_TIMEOUT)
        .build()
}

/// Mutable session state. Replaced wholesale when the operator submits a
/// token or the token is invalidated; an empty token means no session.
struct Session {
    token: Secret<String>,
    account: Option<AccountInfo>,
    cached_paused: bool,
}

impl Session {
    fn empty() -> Self {
        Self {
            token: Secret::new(String::new()),
            account: None,
            cached_paused: false,
        }
    }
}

/// Client for the Leigod account API. One instance per service; holds the
/// single account session.
pub struct AccountClient {
    http: reqwest::Client,
    base_url: String,
    notifier: Arc<dyn Notify>,
    session: RwLock<Session>,
}

impl AccountClient {
    /// Create a client against the public vendor API.
    pub fn new(http: reqwest::Client, notifier: Arc<dyn Notify>) -> Self {
        Self::with_base_url(http, notifier, API_BASE_URL)
    }

    /// Create a client against an alternative base URL (tests).
    pub fn with_base_url(
        http: reqwest::Client,
        notifier: Arc<dyn Notify>,
        base_url: &str,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            notifier,
            session: RwLock::new(Session::empty()),
        }
    }

    /// Whether a (possibly stale) token is currently held.
    pub async fn has_token(&self) -> bool {
        !self.session.read().await.token.is_empty()
    }

    /// Masked rendering of the held token for the control panel, or `None`
    /// when no token is held.
    pub async fn masked_token(&self) -> Option<String> {
        let session = self.session.read().await;
        (!session.token.is_empty()).then(|| session.token.masked())
    }

    /// Last fetched account info, if any.
    pub async fn account_info(&self) -> Option<AccountInfo> {
        self.session.read().await.account.clone()
    }

    /// Locally cached pause flag. Best-effort: set from the last info fetch
    /// or a successful pause, re-verified by every poll's determinate state.
    pub async fn cached_paused(&self) -> bool {
        self.session.read().await.cached_paused
    }

    /// Clear the session entirely (operator reset).
    pub async fn clear(&self) {
        *self.session.write().await = Session::empty();
    }

    /// Replace the session token and verify it against `/user/info`.
    ///
    /// The previous session is discarded first, so a failed verification
    /// leaves the client with no token rather than the old one.
    pub async fn update_token(&self, token: &str) -> Result<AccountInfo> {
        {
            let mut session = self.session.write().await;
            *session = Session::empty();
            if token.is_empty() {
                return Err(Error::InvalidToken);
            }
            session.token = Secret::new(token.to_string());
        }
        self.fetch_account_info().await
    }

    /// Fetch account info and refresh the cached nickname/pause flag.
    ///
    /// Fail-closed: any failure here clears the token.
    pub async fn fetch_account_info(&self) -> Result<AccountInfo> {
        let token = self.current_token().await?;

        let envelope = match self
            .post_envelope::<AccountInfo>(
                INFO_PATH,
                &[
                    ("account_token", token.as_str()),
                    ("lang", LANG),
                    ("os_type", OS_TYPE),
                ],
            )
            .await
        {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "account info fetch failed, clearing token");
                self.invalidate().await;
                return Err(e);
            }
        };

        if envelope.code != CODE_OK {
            warn!(code = envelope.code, "vendor rejected account info, clearing token");
            self.invalidate().await;
            return Err(Error::AuthInvalid(envelope.msg));
        }

        let Some(account) = envelope.data else {
            self.invalidate().await;
            return Err(Error::Parse("account info response missing data".into()));
        };

        let mut session = self.session.write().await;
        session.cached_paused = account.is_paused();
        session.account = Some(account.clone());
        info!(account = %account.nickname, paused = account.is_paused(), "account info refreshed");
        Ok(account)
    }

    /// Pause acceleration.
    ///
    /// Short-circuits on the cached pause flag without a vendor call; the
    /// flag may be stale, in which case the vendor's own "already paused"
    /// rejection comes back as `VendorRejected`.
    pub async fn pause(&self) -> Result<String> {
        let token = {
            let session = self.session.read().await;
            if session.token.is_empty() {
                return Err(Error::InvalidToken);
            }
            if session.cached_paused {
                return Err(Error::AlreadyPaused);
            }
            session.token.expose().clone()
        };

        let envelope = self
            .post_envelope::<serde_json::Value>(
                PAUSE_PATH,
                &[
                    ("account_token", token.as_str()),
                    ("lang", LANG),
                    ("os_type", OS_TYPE),
                ],
            )
            .await?;

        match envelope.code {
            CODE_OK => {
                self.session.write().await.cached_paused = true;
                info!("acceleration paused");
                self.notifier
                    .notify(
                        "Leigod auto-pause",
                        "Account acceleration has been paused.",
                        "leigod",
                    )
                    .await;
                if envelope.msg.is_empty() {
                    Ok("paused".to_string())
                } else {
                    Ok(envelope.msg)
                }
            }
            CODE_TOKEN_INVALID => {
                warn!("pause rejected, token expired");
                self.invalidate().await;
                Err(Error::AuthInvalid(envelope.msg))
            }
            code => Err(Error::VendorRejected {
                code,
                message: envelope.msg,
            }),
        }
    }

    /// Fetch one page of the usage log, newest first.
    ///
    /// Each returned record carries `duration` copied from the vendor's
    /// `reduce_pause_time` field (0 when absent).
    pub async fn fetch_usage_log(&self, page: u32, size: u32) -> Result<UsageLogData> {
        let token = self.current_token().await?;
        let page = page.to_string();
        let size = size.to_string();

        let envelope = self
            .post_envelope::<UsageLogData>(
                USAGE_LOG_PATH,
                &[
                    ("account_token", token.as_str()),
                    ("page", page.as_str()),
                    ("size", size.as_str()),
                    ("lang", LANG),
                    ("region_code", REGION_CODE),
                    ("src_channel", SRC_CHANNEL),
                    ("os_type", OS_TYPE),
                ],
            )
            .await?;

        match envelope.code {
            CODE_OK => {
                let mut data = envelope.data.unwrap_or_default();
                for record in &mut data.list {
                    record.duration = record.reduce_pause_time.unwrap_or(0);
                }
                Ok(data)
            }
            CODE_TOKEN_INVALID => {
                warn!("usage log fetch rejected, token expired");
                self.invalidate().await;
                Err(Error::AuthInvalid(envelope.msg))
            }
            code => Err(Error::VendorRejected {
                code,
                message: envelope.msg,
            }),
        }
    }

    /// Clone the held token or fail without a vendor call.
    async fn current_token(&self) -> Result<String> {
        let session = self.session.read().await;
        if session.token.is_empty() {
            return Err(Error::InvalidToken);
        }
        Ok(session.token.expose().clone())
    }

    /// Drop the session. The scheduler observes the missing token on its
    /// next check and transitions to Idle.
    async fn invalidate(&self) {
        *self.session.write().await = Session::empty();
    }

    /// POST a form-encoded request and parse the response envelope.
    async fn post_envelope<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<ApiEnvelope<T>> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("POST {path}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("POST {path} returned {status}")));
        }

        response
            .json::<ApiEnvelope<T>>()
            .await
            .map_err(|e| Error::Parse(format!("POST {path}: {e}")))
    }
}
