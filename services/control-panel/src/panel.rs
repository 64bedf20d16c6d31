//! Control-panel routes
//!
//! Thin surface over the monitor and scheduler: an HTML panel plus three
//! form actions (update-token, pause, reset). Handlers only move state
//! through the monitor's operator entry points — no vendor call happens
//! here that the monitor does not own.
//!
//! The panel never shows the raw token: the masked rendering goes into
//! the page and the submission history.

use std::sync::Arc;
use std::time::Instant;

use autopause::{Monitor, Scheduler, SchedulerStatus, StatusSnapshot};
use axum::Router;
use axum::extract::{Form, State};
use axum::response::{Html, Redirect};
use axum::routing::{get, post};
use chrono::Local;
use common::Secret;
use leigod_api::{AccountInfo, TIMESTAMP_FORMAT};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::metrics::record_panel_action;

/// Token submissions kept for the panel's history list.
const HISTORY_LIMIT: usize = 5;

/// One masked token submission.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub time: String,
    pub masked_token: String,
}

/// Operator-action state shown at the top of the panel. Distinct from the
/// monitor's poll snapshot: this reflects the last thing the operator did,
/// the snapshot reflects the last thing a poll found.
#[derive(Debug)]
pub struct UiState {
    pub status_message: String,
    pub last_update_time: Option<String>,
    pub history: Vec<HistoryEntry>,
}

impl UiState {
    pub fn initial() -> Self {
        Self {
            status_message: "submit an account token to start monitoring".into(),
            last_update_time: None,
            history: Vec::new(),
        }
    }

    fn push_history(&mut self, entry: HistoryEntry) {
        self.history.insert(0, entry);
        self.history.truncate(HISTORY_LIMIT);
    }
}

/// Shared state for all panel handlers.
#[derive(Clone)]
pub struct PanelState {
    pub monitor: Arc<Monitor>,
    pub scheduler: Arc<Scheduler>,
    pub ui: Arc<Mutex<UiState>>,
    pub prometheus: PrometheusHandle,
    pub started_at: Instant,
}

impl PanelState {
    pub fn new(
        monitor: Arc<Monitor>,
        scheduler: Arc<Scheduler>,
        prometheus: PrometheusHandle,
    ) -> Self {
        Self {
            monitor,
            scheduler,
            ui: Arc::new(Mutex::new(UiState::initial())),
            prometheus,
            started_at: Instant::now(),
        }
    }
}

/// Panel routes; merged into the service router in `main`.
pub fn routes() -> Router<PanelState> {
    Router::new()
        .route("/", get(home))
        .route("/update-token", post(update_token))
        .route("/pause", post(pause))
        .route("/reset", post(reset))
}

async fn home(State(state): State<PanelState>) -> Html<String> {
    let snapshot = state.monitor.status().await;
    let account = state.monitor.client().account_info().await;
    let masked_token = state.monitor.client().masked_token().await;
    let scheduler = state.scheduler.status().await;
    let ui = state.ui.lock().await;
    Html(render_home(
        &ui,
        &snapshot,
        account.as_ref(),
        masked_token.as_deref(),
        scheduler,
    ))
}

#[derive(Deserialize)]
struct TokenForm {
    token: String,
}

async fn update_token(
    State(state): State<PanelState>,
    Form(form): Form<TokenForm>,
) -> Redirect {
    record_panel_action("update_token");
    let token = form.token.trim().to_string();
    let now = local_now_string();

    if token.is_empty() {
        state.scheduler.stop().await;
        state.monitor.reset().await;
        let mut ui = state.ui.lock().await;
        ui.status_message = "empty token submitted, session cleared".into();
        ui.last_update_time = Some(now);
        return Redirect::to("/");
    }

    let masked_token = Secret::new(token.clone()).masked();
    let message = match state.monitor.set_token(&token).await {
        Ok(account) => {
            let status = state.scheduler.start(state.monitor.clone()).await;
            info!(account = %account.nickname, scheduler = status.label(), "token updated");
            format!(
                "token updated, account {} ({})",
                account.nickname, account.pause_status
            )
        }
        Err(e) => {
            state.scheduler.stop().await;
            format!("token update failed: {e}")
        }
    };

    let mut ui = state.ui.lock().await;
    ui.status_message = message;
    ui.push_history(HistoryEntry {
        time: now.clone(),
        masked_token,
    });
    ui.last_update_time = Some(now);
    Redirect::to("/")
}

async fn pause(State(state): State<PanelState>) -> Redirect {
    record_panel_action("pause");
    let message = if state.monitor.has_token().await {
        match state.monitor.manual_pause().await {
            Ok(vendor_msg) => format!("pause requested: {vendor_msg}"),
            Err(leigod_api::Error::AlreadyPaused) => "account is already paused".into(),
            Err(e) if e.is_auth() => {
                state.scheduler.stop().await;
                format!("token no longer valid: {e}")
            }
            Err(e) => format!("pause failed: {e}"),
        }
    } else {
        state.scheduler.stop().await;
        "no valid token, submit one first".to_string()
    };

    let mut ui = state.ui.lock().await;
    ui.status_message = message;
    ui.last_update_time = Some(local_now_string());
    Redirect::to("/")
}

async fn reset(State(state): State<PanelState>) -> Redirect {
    record_panel_action("reset");
    state.scheduler.stop().await;
    state.monitor.reset().await;

    let mut ui = state.ui.lock().await;
    *ui = UiState::initial();
    ui.status_message = "state reset, submit a new token".into();
    ui.last_update_time = Some(local_now_string());
    Redirect::to("/")
}

fn local_now_string() -> String {
    Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string()
}

fn render_home(
    ui: &UiState,
    snapshot: &StatusSnapshot,
    account: Option<&AccountInfo>,
    masked_token: Option<&str>,
    scheduler: SchedulerStatus,
) -> String {
    let nickname = account
        .map(|a| escape_html(&a.nickname))
        .unwrap_or_else(|| "-".into());
    let last_update = ui.last_update_time.as_deref().unwrap_or("never");
    let last_poll = snapshot.updated_at.as_deref().unwrap_or("never");

    let history_items: String = ui
        .history
        .iter()
        .map(|entry| {
            format!(
                "<li>{} &mdash; {}</li>",
                escape_html(&entry.time),
                escape_html(&entry.masked_token)
            )
        })
        .collect();

    let record_rows: String = snapshot
        .records
        .iter()
        .map(|record| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(record.pause_time.as_deref().unwrap_or("-")),
                escape_html(record.recover_time.as_deref().unwrap_or("-")),
                record.duration,
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Leigod auto-pause</title></head>
<body>
<h1>Leigod auto-pause</h1>
<p><b>Account:</b> {nickname} &middot; <b>Token:</b> {token} &middot; <b>Scheduler:</b> {scheduler}</p>
<p><b>Status:</b> {status_message} (updated {last_update})</p>
<p><b>Last poll:</b> {poll_message} &middot; state {state}, {elapsed:.2} min ({last_poll})</p>
<form method="post" action="/update-token">
  <input type="text" name="token" placeholder="account token" autocomplete="off">
  <button type="submit">Update token</button>
</form>
<form method="post" action="/pause"><button type="submit">Pause now</button></form>
<form method="post" action="/reset"><button type="submit">Reset</button></form>
<h2>Recent usage records</h2>
<table border="1"><tr><th>Paused at</th><th>Recovered at</th><th>Duration (min)</th></tr>{record_rows}</table>
<h2>Token history</h2>
<ul>{history_items}</ul>
</body>
</html>
"#,
        nickname = nickname,
        token = escape_html(masked_token.unwrap_or("-")),
        scheduler = scheduler.label(),
        status_message = escape_html(&ui.status_message),
        last_update = escape_html(last_update),
        poll_message = escape_html(&snapshot.message),
        state = snapshot.state.label(),
        elapsed = snapshot.elapsed_minutes,
        last_poll = escape_html(last_poll),
        record_rows = record_rows,
        history_items = history_items,
    )
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopause::Thresholds;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use leigod_api::AccountClient;
    use notify::Disabled;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    fn test_prometheus_handle() -> PrometheusHandle {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        recorder.handle()
    }

    async fn serve_vendor(app: axum::Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        format!("http://{addr}")
    }

    fn vendor_ok_router(pause_status_id: i64) -> axum::Router {
        axum::Router::new()
            .route(
                "/user/info",
                axum::routing::post(move || async move {
                    axum::Json(serde_json::json!({
                        "code": 0,
                        "msg": "ok",
                        "data": {"nickname": "player1", "pause_status": "accelerating", "pause_status_id": pause_status_id}
                    }))
                }),
            )
            .route(
                "/user/pause",
                axum::routing::post(|| async {
                    axum::Json(serde_json::json!({"code": 0, "msg": "pause ok"}))
                }),
            )
            .route(
                "/user/time/log",
                axum::routing::post(|| async {
                    axum::Json(serde_json::json!({"code": 0, "msg": "ok", "data": {"list": []}}))
                }),
            )
    }

    fn panel_for(base: &str) -> PanelState {
        let client = Arc::new(AccountClient::with_base_url(
            reqwest::Client::new(),
            Arc::new(Disabled),
            base,
        ));
        let monitor = Arc::new(Monitor::new(
            client,
            Arc::new(Disabled),
            Thresholds::default(),
        ));
        // Long interval: tests drive cycles through the handlers only
        let scheduler = Arc::new(Scheduler::new(Duration::from_secs(3600)));
        PanelState::new(monitor, scheduler, test_prometheus_handle())
    }

    fn app(state: PanelState) -> axum::Router {
        axum::Router::new().merge(routes()).with_state(state)
    }

    async fn get_home(state: &PanelState) -> String {
        let response = app(state.clone())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    async fn post_form(state: &PanelState, uri: &str, body: &str) -> StatusCode {
        let response = app(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn home_renders_initial_state() {
        let state = panel_for("http://127.0.0.1:1");
        let page = get_home(&state).await;
        assert!(page.contains("submit an account token"));
        assert!(page.contains("idle"));
    }

    #[tokio::test]
    async fn update_token_starts_scheduler_and_masks_history() {
        let base = serve_vendor(vendor_ok_router(0)).await;
        let state = panel_for(&base);

        let status = post_form(&state, "/update-token", "token=secret-token-9876").await;
        assert_eq!(status, StatusCode::SEE_OTHER);

        let page = get_home(&state).await;
        assert!(page.contains("player1"), "page: {page}");
        assert!(page.contains("running"));
        assert!(page.contains("****9876"), "history must mask the token");
        assert!(
            !page.contains("secret-token-9876"),
            "raw token must never reach the page"
        );
        state.scheduler.stop().await;
    }

    #[tokio::test]
    async fn rejected_token_stops_scheduler() {
        let app_router = axum::Router::new().route(
            "/user/info",
            axum::routing::post(|| async {
                axum::Json(serde_json::json!({"code": 400006, "msg": "token expired"}))
            }),
        );
        let base = serve_vendor(app_router).await;
        let state = panel_for(&base);

        post_form(&state, "/update-token", "token=stale").await;

        let page = get_home(&state).await;
        assert!(page.contains("token update failed"), "page: {page}");
        assert!(page.contains("idle"));
        assert!(!state.monitor.has_token().await);
    }

    #[tokio::test]
    async fn empty_token_clears_session() {
        let base = serve_vendor(vendor_ok_router(0)).await;
        let state = panel_for(&base);

        post_form(&state, "/update-token", "token=tok-123456").await;
        assert!(state.monitor.has_token().await);

        post_form(&state, "/update-token", "token=").await;
        assert!(!state.monitor.has_token().await);

        let page = get_home(&state).await;
        assert!(page.contains("session cleared"));
        state.scheduler.stop().await;
    }

    #[tokio::test]
    async fn pause_without_token_reports_and_stays_idle() {
        let state = panel_for("http://127.0.0.1:1");
        let status = post_form(&state, "/pause", "").await;
        assert_eq!(status, StatusCode::SEE_OTHER);

        let page = get_home(&state).await;
        assert!(page.contains("no valid token"));
    }

    #[tokio::test]
    async fn manual_pause_reports_vendor_message() {
        let base = serve_vendor(vendor_ok_router(0)).await;
        let state = panel_for(&base);

        post_form(&state, "/update-token", "token=tok-123456").await;
        post_form(&state, "/pause", "").await;

        let page = get_home(&state).await;
        assert!(page.contains("pause requested: pause ok"), "page: {page}");
        state.scheduler.stop().await;
    }

    #[tokio::test]
    async fn pause_on_already_paused_account_is_reported() {
        let base = serve_vendor(vendor_ok_router(1)).await;
        let state = panel_for(&base);

        post_form(&state, "/update-token", "token=tok-123456").await;
        post_form(&state, "/pause", "").await;

        let page = get_home(&state).await;
        assert!(page.contains("already paused"), "page: {page}");
        state.scheduler.stop().await;
    }

    #[tokio::test]
    async fn reset_clears_history_and_stops() {
        let base = serve_vendor(vendor_ok_router(0)).await;
        let state = panel_for(&base);

        post_form(&state, "/update-token", "token=tok-123456").await;
        post_form(&state, "/reset", "").await;

        assert!(!state.monitor.has_token().await);
        let page = get_home(&state).await;
        assert!(page.contains("state reset"));
        assert!(!page.contains("****3456"), "history must be cleared");
        assert!(page.contains("idle"));
    }

    #[tokio::test]
    async fn history_is_capped() {
        let base = serve_vendor(vendor_ok_router(0)).await;
        let state = panel_for(&base);

        for i in 0..7 {
            post_form(&state, "/update-token", &format!("token=token-number-{i}00")).await;
        }
        assert_eq!(state.ui.lock().await.history.len(), HISTORY_LIMIT);
        state.scheduler.stop().await;
    }

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html(r#"<script>"a"&b</script>"#),
            "&lt;script&gt;&quot;a&quot;&amp;b&lt;/script&gt;"
        );
    }
}
