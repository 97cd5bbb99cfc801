//! Prometheus metrics for the harvest pipeline.
//!
//! This module provides metrics for:
//! - HTTP attempts made by the resilient client (outcomes, retries, latency)
//! - Page fetching and item enrichment (per-unit results)
//! - Stage durations

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

// =============================================================================
// HTTP Client Metrics
// =============================================================================

/// HTTP attempts total by outcome.
pub static HTTP_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("prharvest_http_attempts_total", "Total HTTP attempts"),
        &["outcome"], // "success", "retryable_status", "error_status", "transport_error"
    )
    .unwrap()
});

/// Retries scheduled by the client.
pub static HTTP_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("prharvest_http_retries_total", "Total HTTP retries scheduled").unwrap()
});

/// Duration of a single HTTP attempt.
pub static HTTP_ATTEMPT_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "prharvest_http_attempt_duration_seconds",
            "Duration of single HTTP attempts",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Page fetch tasks by result.
pub static PAGES_FETCHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("prharvest_pages_total", "Total page fetch tasks"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Items kept after the completion filter.
pub static ITEMS_KEPT: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "prharvest_items_kept_total",
        "Items with a completion timestamp kept for enrichment",
    )
    .unwrap()
});

/// Items discarded by the completion filter.
pub static ITEMS_DISCARDED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "prharvest_items_discarded_total",
        "Items without a completion timestamp",
    )
    .unwrap()
});

/// Merged items that could not be parsed.
pub static ITEMS_MALFORMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "prharvest_items_malformed_total",
        "Merged listing elements skipped as malformed",
    )
    .unwrap()
});

/// Enrichment tasks by result.
pub static ENRICHMENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("prharvest_enrichments_total", "Total item enrichments"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Derived check statuses.
pub static CHECKS_STATUS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("prharvest_checks_status_total", "Derived check statuses"),
        &["status"],
    )
    .unwrap()
});

/// Stage durations.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("prharvest_stage_duration_seconds", "Duration of pipeline stages")
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0]),
        &["stage"], // "discover", "fetch", "enrich", "aggregate"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(HTTP_ATTEMPTS.clone()),
        Box::new(HTTP_RETRIES.clone()),
        Box::new(HTTP_ATTEMPT_DURATION.clone()),
        Box::new(PAGES_FETCHED.clone()),
        Box::new(ITEMS_KEPT.clone()),
        Box::new(ITEMS_DISCARDED.clone()),
        Box::new(ITEMS_MALFORMED.clone()),
        Box::new(ENRICHMENTS.clone()),
        Box::new(CHECKS_STATUS.clone()),
        Box::new(STAGE_DURATION.clone()),
    ]
}

/// Render every metric in the Prometheus text exposition format.
pub fn render_text() -> Result<String, prometheus::Error> {
    let registry = Registry::new();
    for metric in all_metrics() {
        registry.register(metric)?;
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
