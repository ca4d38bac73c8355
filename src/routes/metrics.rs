use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Register descriptions for the metrics this service emits.
pub fn describe_metrics() {
    metrics::describe_counter!("jobs_created_total", "Jobs created");
    metrics::describe_counter!("job_params_updated_total", "Job parameter replacements");
    metrics::describe_counter!(
        "job_dispatch_total",
        "Detection server dispatches by outcome (submitted, rejected, unreachable)"
    );
    metrics::describe_histogram!(
        "job_dispatch_seconds",
        "Time spent waiting on the detection server"
    );
    metrics::describe_counter!("files_uploaded_total", "Files proxied into blob storage");
}

/// Prometheus scrape endpoint (text exposition format).
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
