//! Prometheus metrics exposition
//!
//! The monitor loop records its own counters (`autopause_poll_cycles_total`,
//! `autopause_pause_actions_total`, `autopause_notifications_total`); this
//! module installs the recorder that makes them visible and adds the
//! panel-request counter:
//!
//! - `panel_requests_total` (counter): label `action`

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering
/// metrics. The handle's `render()` method produces the text exposition
/// format served on `/metrics`.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record one control-panel action (update-token, pause, reset).
pub fn record_panel_action(action: &str) {
    metrics::counter!("panel_requests_total", "action" => action.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        // When no recorder is installed, metrics calls are no-ops.
        record_panel_action("update_token");
    }

    /// Create an isolated recorder/handle pair for unit tests.
    /// build_recorder() avoids the global recorder singleton constraint —
    /// install_recorder() panics on a second call in the same process.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn panel_actions_render_with_action_label() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_panel_action("update_token");
        record_panel_action("pause");
        record_panel_action("pause");

        let output = handle.render();
        assert!(
            output.contains("panel_requests_total"),
            "rendered output must contain panel_requests_total, got:\n{output}"
        );
        assert!(output.contains("action=\"update_token\""));
        assert!(output.contains("action=\"pause\""));
    }

    #[test]
    fn monitor_counters_render_through_the_same_recorder() {
        // The autopause crate records its counters with the plain
        // metrics::counter! macro, so whatever recorder the service
        // installs picks them up with no extra wiring.
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        metrics::counter!("autopause_poll_cycles_total", "outcome" => "ok").increment(1);

        let output = handle.render();
        assert!(output.contains("autopause_poll_cycles_total"));
        assert!(output.contains("outcome=\"ok\""));
    }
}
