//! ServerChan push transport
//!
//! Posts form-encoded messages to `https://sctapi.ftqq.com/{sendkey}.send`.
//! The send key is part of the URL, so the full send URL is treated as a
//! secret and never logged.

use std::future::Future;
use std::pin::Pin;

use common::Secret;
use tracing::{debug, warn};

use crate::Notify;

/// Public ServerChan API host. The per-operator send key selects the channel.
pub const SERVERCHAN_API_BASE: &str = "https://sctapi.ftqq.com";

/// ServerChan push channel.
pub struct ServerChan {
    client: reqwest::Client,
    send_url: Secret<String>,
}

impl ServerChan {
    /// Create a transport posting to the public ServerChan API.
    pub fn new(client: reqwest::Client, sendkey: &Secret<String>) -> Self {
        Self::with_api_base(client, sendkey, SERVERCHAN_API_BASE)
    }

    /// Create a transport against an alternative API host (tests).
    pub fn with_api_base(
        client: reqwest::Client,
        sendkey: &Secret<String>,
        api_base: &str,
    ) -> Self {
        let send_url = Secret::new(format!("{api_base}/{}.send", sendkey.expose()));
        Self { client, send_url }
    }

    async fn send(&self, title: &str, message: &str, tags: &str) {
        let result = self
            .client
            .post(self.send_url.expose())
            .form(&[("title", title), ("desp", message), ("tags", tags)])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(title, "push notification delivered");
            }
            Ok(response) => {
                warn!(
                    title,
                    status = response.status().as_u16(),
                    "push notification rejected"
                );
            }
            Err(e) => {
                warn!(title, error = %e, "push notification failed");
            }
        }
    }
}

impl Notify for ServerChan {
    fn id(&self) -> &str {
        "serverchan"
    }

    fn notify<'a>(
        &'a self,
        title: &'a str,
        message: &'a str,
        tags: &'a str,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(self.send(title, message, tags))
    }
}
