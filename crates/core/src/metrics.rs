//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Conversions (outcomes, durations)
//! - Progress streams (live subscribers)
//! - Job registry housekeeping

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Conversion Metrics
// =============================================================================

/// Conversions by outcome.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vidgenie_conversions_total", "Total conversions by result"),
        &["result"], // "succeeded", "failed", "timed_out", "cancelled"
    )
    .unwrap()
});

/// Conversion wall time in seconds.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "vidgenie_conversion_duration_seconds",
            "Duration of conversions from job creation to result",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 900.0]),
        &["result"],
    )
    .unwrap()
});

/// Thumbnail and probe calls by outcome.
pub static MEDIA_OPERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vidgenie_media_operations_total",
            "Total probe and thumbnail operations",
        ),
        &["operation", "result"],
    )
    .unwrap()
});

// =============================================================================
// Progress Stream Metrics
// =============================================================================

/// Progress streams currently polling the registry.
pub static PROGRESS_STREAMS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "vidgenie_progress_streams_active",
        "Number of open progress streams",
    )
    .unwrap()
});

// =============================================================================
// Registry Metrics
// =============================================================================

/// Jobs removed by the reaper because nobody consumed them.
pub static JOBS_REAPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "vidgenie_jobs_reaped_total",
        "Total jobs removed by the stale job reaper",
    )
    .unwrap()
});

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        Box::new(MEDIA_OPERATIONS_TOTAL.clone()),
        Box::new(PROGRESS_STREAMS_ACTIVE.clone()),
        Box::new(JOBS_REAPED.clone()),
    ]
}
