use std::time::{Duration, Instant};

use axum::http::header;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use tracing::warn;

use crate::ingest::IngestQueue;

const SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

static REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["handler", "method", "status"]
    )
    .unwrap()
});

static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "http_errors_total",
        "Total number of HTTP errors",
        &["handler", "method"]
    )
    .unwrap()
});

static REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request handling time",
        &["handler", "method"]
    )
    .unwrap()
});

static APP_RAM_BYTES: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("app_ram_bytes", "Resident memory of the process in bytes").unwrap()
});

static INGEST_QUEUE_DEPTH: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("ingest_queue_depth", "Write operations waiting in the ingest queue").unwrap()
});

/// Per-request middleware on the public router: counts, errors, latency.
pub async fn track<B>(request: Request<B>, next: Next<B>) -> Response {
    let handler = request.uri().path().to_owned();
    let method = request.method().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    REQUESTS_TOTAL
        .with_label_values(&[&handler, &method, status.as_str()])
        .inc();
    if status.is_client_error() || status.is_server_error() {
        ERRORS_TOTAL.with_label_values(&[&handler, &method]).inc();
    }
    REQUEST_DURATION
        .with_label_values(&[&handler, &method])
        .observe(start.elapsed().as_secs_f64());
    response
}

/// Text exposition on the private listener.
pub async fn serve() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&prometheus::gather(), &mut buffer) {
        warn!(?err, "could not encode metrics");
    }
    (
        [(header::CONTENT_TYPE, encoder.format_type().to_owned())],
        buffer,
    )
}

/// Samples process gauges every few seconds for as long as the process runs.
pub async fn sample_system(queue: IngestQueue) {
    loop {
        if let Some(bytes) = resident_bytes() {
            APP_RAM_BYTES.set(bytes);
        }
        INGEST_QUEUE_DEPTH.set(queue.depth() as f64);
        tokio::time::sleep(SAMPLE_INTERVAL).await;
    }
}

#[cfg(target_os = "linux")]
fn resident_bytes() -> Option<f64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: f64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident_pages * 4096.0)
}

#[cfg(not(target_os = "linux"))]
fn resident_bytes() -> Option<f64> {
    None
}
