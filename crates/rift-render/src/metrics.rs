//! Prometheus metrics for rift-render.
//!
//! Tracks response rendering, upstream proxying and template compilation.
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    /// Rendered responses by mode
    pub static ref RENDERS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rift_renders_total",
        "Total number of responses rendered",
        &["mode"]  // mode: static|templated|proxy|error
    )
    .unwrap();

    /// Upstream requests that produced no response
    pub static ref UPSTREAM_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rift_upstream_failures_total",
        "Total number of proxied requests whose upstream was unavailable",
        &["reason"]  // reason: connect|timeout|body
    )
    .unwrap();

    /// Upstream request duration
    pub static ref UPSTREAM_DURATION_MS: HistogramVec = register_histogram_vec!(
        "rift_upstream_duration_ms",
        "Duration of proxied upstream requests in milliseconds",
        &["method", "status"],
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap();

    /// Templates compiled (cache misses)
    pub static ref TEMPLATES_COMPILED_TOTAL: IntCounter = register_int_counter!(
        "rift_templates_compiled_total",
        "Total number of response templates compiled"
    )
    .unwrap();

    /// Compiled templates currently cached
    pub static ref TEMPLATE_CACHE_ENTRIES: IntGauge = register_int_gauge!(
        "rift_template_cache_entries",
        "Number of compiled templates held in the cache"
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_render(mode: &str) {
    RENDERS_TOTAL.with_label_values(&[mode]).inc();
}

pub fn record_upstream_failure(reason: &str) {
    UPSTREAM_FAILURES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_upstream_duration(method: &str, status: u16, duration_ms: f64) {
    UPSTREAM_DURATION_MS
        .with_label_values(&[method, &status.to_string()])
        .observe(duration_ms);
}
