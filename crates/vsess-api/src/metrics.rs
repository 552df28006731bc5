//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Install the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vsess_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vsess_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vsess_http_requests_in_flight";

    // Session metrics
    pub const UPLOADS_TOTAL: &str = "vsess_uploads_total";
    pub const FRAMES_SERVED_TOTAL: &str = "vsess_frames_served_total";
    pub const TRANSFORMS_TOTAL: &str = "vsess_transforms_total";
    pub const FFMPEG_DURATION_SECONDS: &str = "vsess_ffmpeg_duration_seconds";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "vsess_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an upload attempt by outcome.
pub fn record_upload(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::UPLOADS_TOTAL, &labels).increment(1);
}

pub fn record_frame_served() {
    counter!(names::FRAMES_SERVED_TOTAL).increment(1);
}

/// Record a finished transform.
pub fn record_transform(layout: &str, outcome: &str) {
    let labels = [
        ("layout", layout.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::TRANSFORMS_TOTAL, &labels).increment(1);
}

/// Record time spent in FFmpeg/FFprobe for an operation.
pub fn record_ffmpeg_duration(operation: &str, duration_secs: f64) {
    let labels = [("operation", operation.to_string())];
    histogram!(names::FFMPEG_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Collapse per-resource path segments so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    if path.starts_with("/download/") {
        "/download/:out_file".to_string()
    } else if path.starts_with("/assets/") {
        "/assets/:file_id".to_string()
    } else {
        path.to_string()
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
