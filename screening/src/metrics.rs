//! Provider call metrics

use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

lazy_static::lazy_static! {
    pub static ref PROVIDER_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "screening_provider_requests_total",
        "Total screening provider calls",
        &["provider", "operation", "status"]
    )
    .unwrap();

    pub static ref PROVIDER_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "screening_provider_request_duration_seconds",
        "Screening provider call duration",
        &["provider", "operation"]
    )
    .unwrap();
}

pub(crate) fn record_call(provider: &str, operation: &str, status: &str, seconds: f64) {
    PROVIDER_REQUESTS_TOTAL
        .with_label_values(&[provider, operation, status])
        .inc();
    PROVIDER_REQUEST_DURATION
        .with_label_values(&[provider, operation])
        .observe(seconds);
}
