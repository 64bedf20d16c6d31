//! Operator push notifications
//!
//! Defines the `Notify` trait that decouples the monitor loop from the push
//! transport. `ServerChan` posts to the ServerChan (sctapi.ftqq.com) send
//! endpoint; `Disabled` is the no-op used when no send key is configured.
//!
//! Notifications are fire-and-forget: a failed or slow push is logged and
//! dropped, it never surfaces as an error to the caller. The auto-pause
//! decision must not depend on the push channel being up.

pub mod serverchan;

pub use serverchan::ServerChan;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use common::Secret;
use tracing::info;

/// Abstraction over push notification transports.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn Notify>`).
pub trait Notify: Send + Sync {
    /// Identifier for logging (e.g. "serverchan", "disabled")
    fn id(&self) -> &str;

    /// Send a push message. Infallible from the caller's perspective:
    /// transport failures are logged inside the implementation.
    fn notify<'a>(
        &'a self,
        title: &'a str,
        message: &'a str,
        tags: &'a str,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// No-op transport used when no send key is configured.
pub struct Disabled;

impl Notify for Disabled {
    fn id(&self) -> &str {
        "disabled"
    }

    fn notify<'a>(
        &'a self,
        _title: &'a str,
        _message: &'a str,
        _tags: &'a str,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async {})
    }
}

/// Build a notifier from an optional ServerChan send key.
///
/// An absent or empty key silently disables push notifications; the
/// returned `Disabled` transport accepts and drops every message.
pub fn from_sendkey(client: reqwest::Client, sendkey: Option<Secret<String>>) -> Arc<dyn Notify> {
    match sendkey {
        Some(key) if !key.is_empty() => {
            info!("ServerChan notifications enabled");
            Arc::new(ServerChan::new(client, &key))
        }
        _ => {
            info!("no ServerChan send key configured, push notifications disabled");
            Arc::new(Disabled)
        }
    }
}
