//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Call once at startup,
/// before any metric is recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// Sessions currently registered (gauge).
pub const HUB_SESSIONS_ACTIVE: &str = "hub_sessions_active";
/// Sessions admitted since start (counter).
pub const HUB_SESSIONS_TOTAL: &str = "hub_sessions_total";
/// Session endings (counter, labels: reason).
pub const HUB_SESSIONS_CLOSED_TOTAL: &str = "hub_sessions_closed_total";
/// Session lifetime in seconds (histogram).
pub const HUB_SESSION_DURATION_SECONDS: &str = "hub_session_duration_seconds";
/// Messages enqueued for an online recipient (counter, labels: kind).
pub const HUB_MESSAGES_ROUTED_TOTAL: &str = "hub_messages_routed_total";
/// Messages dropped because the recipient was offline or evicted (counter, labels: reason).
pub const HUB_MESSAGES_DROPPED_TOTAL: &str = "hub_messages_dropped_total";
/// Sessions evicted for a full or dead queue (counter).
pub const HUB_EVICTIONS_TOTAL: &str = "hub_evictions_total";
/// Inbound frames that failed to decode (counter).
pub const HUB_DECODE_ERRORS_TOTAL: &str = "hub_decode_errors_total";
/// Upgrades refused by the verifier (counter).
pub const HUB_AUTH_FAILURES_TOTAL: &str = "hub_auth_failures_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_from_local_recorder() {
        // no global install, tests share a process
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(HUB_EVICTIONS_TOTAL).increment(2);
        });
        let output = render(&handle);
        assert!(output.contains("hub_evictions_total 2"));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            HUB_SESSIONS_ACTIVE,
            HUB_SESSIONS_TOTAL,
            HUB_SESSIONS_CLOSED_TOTAL,
            HUB_SESSION_DURATION_SECONDS,
            HUB_MESSAGES_ROUTED_TOTAL,
            HUB_MESSAGES_DROPPED_TOTAL,
            HUB_EVICTIONS_TOTAL,
            HUB_DECODE_ERRORS_TOTAL,
            HUB_AUTH_FAILURES_TOTAL,
        ];
        for name in names {
            assert!(
                name.starts_with("hub_")
                    && name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case with the hub_ prefix"
            );
        }
    }
}
