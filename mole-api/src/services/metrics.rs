use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const PROFILE_SYNC_TOTAL: &str = "profile_sync_total";
pub const PUSH_NOTIFICATIONS_TOTAL: &str = "push_notifications_total";
pub const PRESIGNED_URLS_TOTAL: &str = "presigned_urls_total";

/// Install the global Prometheus recorder. Calling it again is a no-op.
pub fn init_metrics() -> Result<(), anyhow::Error> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    metrics::describe_counter!(PROFILE_SYNC_TOTAL, "Profile refreshes from the identity provider");
    metrics::describe_counter!(PUSH_NOTIFICATIONS_TOTAL, "Push notifications by final outcome");
    metrics::describe_counter!(PRESIGNED_URLS_TOTAL, "Presigned object URLs issued");

    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

pub fn render_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}
