use std::sync::Arc;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};
use quagmire_bot_detect::TagCounter;
use quagmire_common::AppConfig;
use quagmire_session::SessionTracker;
use serde::Serialize;

/// Shared state type alias used across all route handlers.
pub type SharedState = Arc<AdminState>;

/// Read-only view of the process for the admin API.
pub struct AdminState {
    pub config: AppConfig,
    pub metrics: Arc<TarpitMetrics>,
    pub tracker: Arc<SessionTracker>,
    pub tags: Arc<TagCounter>,
    pub model: ModelSummary,
    pub start_time: std::time::Instant,
}

/// Shape of the text model built at startup.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ModelSummary {
    pub order: usize,
    pub vocabulary: usize,
    pub transitions: usize,
}

/// Prometheus metrics collected by the tarpit.
pub struct TarpitMetrics {
    pub registry: Registry,
    pub requests_total: IntCounter,
    pub streams_active: IntGauge,
    pub streams_completed: IntCounter,
    pub streams_cancelled: IntCounter,
    pub words_streamed: IntCounter,
    pub session_dwell: Histogram,
    pub store_errors: IntCounter,
    pub invalid_ip: IntCounter,
}

impl TarpitMetrics {
    /// Create every metric and register it against a fresh registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounter::with_opts(Opts::new(
            "quagmire_requests_total",
            "Total number of tarpit page requests",
        ))?;
        let streams_active = IntGauge::with_opts(Opts::new(
            "quagmire_streams_active",
            "Number of page streams currently open",
        ))?;
        let streams_completed = IntCounter::with_opts(Opts::new(
            "quagmire_streams_completed_total",
            "Page streams that delivered every fragment",
        ))?;
        let streams_cancelled = IntCounter::with_opts(Opts::new(
            "quagmire_streams_cancelled_total",
            "Page streams ended early by disconnect or shutdown",
        ))?;
        let words_streamed = IntCounter::with_opts(Opts::new(
            "quagmire_words_streamed_total",
            "Words written to trapped clients",
        ))?;
        let session_dwell = Histogram::with_opts(
            HistogramOpts::new(
                "quagmire_session_dwell_seconds",
                "Length of finished sessions per source address",
            )
            .buckets(vec![
                1.0, 10.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 10800.0, 43200.0, 86400.0,
            ]),
        )?;
        let store_errors = IntCounter::with_opts(Opts::new(
            "quagmire_store_errors_total",
            "Session store operations that failed",
        ))?;
        let invalid_ip = IntCounter::with_opts(Opts::new(
            "quagmire_invalid_ip_total",
            "Requests whose client address was rejected",
        ))?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(streams_active.clone()))?;
        registry.register(Box::new(streams_completed.clone()))?;
        registry.register(Box::new(streams_cancelled.clone()))?;
        registry.register(Box::new(words_streamed.clone()))?;
        registry.register(Box::new(session_dwell.clone()))?;
        registry.register(Box::new(store_errors.clone()))?;
        registry.register(Box::new(invalid_ip.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            streams_active,
            streams_completed,
            streams_cancelled,
            words_streamed,
            session_dwell,
            store_errors,
            invalid_ip,
        })
    }
}

impl AdminState {
    pub fn new(
        config: AppConfig,
        metrics: Arc<TarpitMetrics>,
        tracker: Arc<SessionTracker>,
        tags: Arc<TagCounter>,
        model: ModelSummary,
    ) -> Self {
        Self {
            config,
            metrics,
            tracker,
            tags,
            model,
            start_time: std::time::Instant::now(),
        }
    }
}
