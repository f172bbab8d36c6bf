//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use cure_models::Category;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "cure_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "cure_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "cure_http_requests_in_flight";

    // Categorization metrics
    pub const STAGE_DURATION_SECONDS: &str = "cure_categorize_stage_duration_seconds";
    pub const CATEGORIES_TOTAL: &str = "cure_categories_total";
    pub const CATEGORIZE_FAILURES_TOTAL: &str = "cure_categorize_failures_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record how long one step of `categorize_image` took
/// (`fetch`, `inference`, `register`, `layer`).
pub fn record_stage_duration(stage: &'static str, duration_secs: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage).record(duration_secs);
}

/// Count a produced category.
pub fn record_category(category: Category) {
    counter!(names::CATEGORIES_TOTAL, "category" => category.to_string()).increment(1);
}

/// Count a failed `categorize_image` call.
pub fn record_categorize_failure(kind: &'static str) {
    counter!(names::CATEGORIZE_FAILURES_TOTAL, "kind" => kind).increment(1);
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    // Route templates only, so unknown paths can't blow up label cardinality
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
