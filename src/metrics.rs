//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Backend Metrics
    pub static ref BACKEND_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("linkcache_backend_requests_total", "Total number of backend requests"),
        &["endpoint", "outcome"]
    ).expect("metric can be created");
    pub static ref BACKEND_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "linkcache_backend_request_duration_seconds",
            "Backend request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["endpoint"]
    ).expect("metric can be created");

    // Cache Metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("linkcache_cache_hits_total", "Total number of fresh cache hits"),
        &["lookup"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("linkcache_cache_misses_total", "Total number of cache misses"),
        &["lookup"]
    ).expect("metric can be created");
    pub static ref CACHE_EXPIRED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("linkcache_cache_expired_total", "Total number of stale cache reads"),
        &["lookup"]
    ).expect("metric can be created");
    pub static ref CACHED_RECORDS: IntGauge = IntGauge::new(
        "linkcache_cached_records",
        "Current number of cached records"
    ).expect("metric can be created");

    // Sync Metrics
    pub static ref REFRESHES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("linkcache_refreshes_total", "Total number of single-record refreshes"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref SYNC_RUNS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("linkcache_sync_runs_total", "Total number of sync runs"),
        &["kind", "status"]
    ).expect("metric can be created");
    pub static ref CONFLICT_RETRIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("linkcache_conflict_retries_total", "Total number of upsert conflict retries"),
        &["outcome"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("linkcache_errors_total", "Total number of API errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(BACKEND_REQUESTS_TOTAL.clone()))
        .expect("BACKEND_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(BACKEND_REQUEST_DURATION_SECONDS.clone()))
        .expect("BACKEND_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(CACHE_HITS_TOTAL.clone()))
        .expect("CACHE_HITS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_MISSES_TOTAL.clone()))
        .expect("CACHE_MISSES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_EXPIRED_TOTAL.clone()))
        .expect("CACHE_EXPIRED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHED_RECORDS.clone()))
        .expect("CACHED_RECORDS can be registered");
    REGISTRY
        .register(Box::new(REFRESHES_TOTAL.clone()))
        .expect("REFRESHES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(SYNC_RUNS_TOTAL.clone()))
        .expect("SYNC_RUNS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CONFLICT_RETRIES_TOTAL.clone()))
        .expect("CONFLICT_RETRIES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

/// Record the outcome and latency of a backend request.
pub fn observe_backend_request(endpoint: &str, outcome: &str, elapsed: std::time::Duration) {
    BACKEND_REQUESTS_TOTAL
        .with_label_values(&[endpoint, outcome])
        .inc();
    BACKEND_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint])
        .observe(elapsed.as_secs_f64());
}
