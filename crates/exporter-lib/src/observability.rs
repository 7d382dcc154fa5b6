//! Observability infrastructure for the exporter
//!
//! Provides:
//! - Prometheus self-metrics (scrape latency, fetch errors, skipped containers)
//!   and omitted memory limits
//! - Structured JSON logging with tracing

use crate::collector::{Document, FetchError};
use crate::exposition::ExpositionError;
use crate::projection::Diagnostic;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, Histogram, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for scrape latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ExporterMetricsInner> = OnceLock::new();

struct ExporterMetricsInner {
    scrape_duration_seconds: Histogram,
    fetch_errors: IntCounterVec,
    containers_skipped: IntCounterVec,
    memory_limits_omitted: IntCounter,
    exposition_conflicts: IntCounter,
    observations: IntGauge,
    last_scrape_success: IntGauge,
    build_info: IntGaugeVec,
}

impl ExporterMetricsInner {
    fn new() -> Self {
        Self {
            scrape_duration_seconds: register_histogram!(
                "ecs_exporter_scrape_duration_seconds",
                "Time spent fetching and projecting the task metadata documents",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register scrape_duration_seconds"),

            fetch_errors: register_int_counter_vec!(
                "ecs_exporter_fetch_errors_total",
                "Total number of failed metadata endpoint requests",
                &["document"]
            )
            .expect("Failed to register fetch_errors_total"),

            containers_skipped: register_int_counter_vec!(
                "ecs_exporter_containers_skipped_total",
                "Total number of container projections skipped, by reason",
                &["reason"]
            )
            .expect("Failed to register containers_skipped_total"),

            memory_limits_omitted: register_int_counter!(
                "ecs_exporter_memory_limits_omitted_total",
                "Total number of container memory limit samples omitted for lack of any limit"
            )
            .expect("Failed to register memory_limits_omitted_total"),

            exposition_conflicts: register_int_counter!(
                "ecs_exporter_exposition_conflicts_total",
                "Total number of scrapes rejected for conflicting samples"
            )
            .expect("Failed to register exposition_conflicts_total"),

            observations: register_int_gauge!(
                "ecs_exporter_observations",
                "Number of samples published by the last successful scrape"
            )
            .expect("Failed to register observations"),

            last_scrape_success: register_int_gauge!(
                "ecs_exporter_last_scrape_success",
                "Whether the last scrape of the metadata endpoint succeeded"
            )
            .expect("Failed to register last_scrape_success"),

            build_info: register_int_gauge_vec!(
                "ecs_exporter_build_info",
                "Exporter version and host clock tick rate",
                &["version", "clock_ticks"]
            )
            .expect("Failed to register build_info"),
        }
    }
}

/// Exporter self-metrics
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ExporterMetrics {
    _private: (),
}

impl Default for ExporterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExporterMetrics {
    /// Create a new metrics handle (registers global metrics on first call)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ExporterMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ExporterMetricsInner {
        GLOBAL_METRICS.get_or_init(ExporterMetricsInner::new)
    }

    pub fn observe_scrape_duration(&self, duration_secs: f64) {
        self.inner().scrape_duration_seconds.observe(duration_secs);
    }

    pub fn inc_fetch_errors(&self, document: Document) {
        self.inner()
            .fetch_errors
            .with_label_values(&[document.as_str()])
            .inc();
    }

    pub fn inc_containers_skipped(&self, reason: &str) {
        self.inner()
            .containers_skipped
            .with_label_values(&[reason])
            .inc();
    }

    pub fn inc_memory_limits_omitted(&self) {
        self.inner().memory_limits_omitted.inc();
    }

    pub fn inc_exposition_conflicts(&self) {
        self.inner().exposition_conflicts.inc();
    }

    pub fn set_observations(&self, count: i64) {
        self.inner().observations.set(count);
    }

    pub fn set_last_scrape_success(&self, success: bool) {
        self.inner().last_scrape_success.set(i64::from(success));
    }

    pub fn set_build_info(&self, version: &str, clock_ticks: u64) {
        self.inner().build_info.reset();
        self.inner()
            .build_info
            .with_label_values(&[version, &clock_ticks.to_string()])
            .set(1);
    }

    pub fn fetch_errors(&self, document: Document) -> u64 {
        self.inner()
            .fetch_errors
            .with_label_values(&[document.as_str()])
            .get()
    }

    pub fn containers_skipped(&self, reason: &str) -> u64 {
        self.inner()
            .containers_skipped
            .with_label_values(&[reason])
            .get()
    }

    pub fn memory_limits_omitted(&self) -> u64 {
        self.inner().memory_limits_omitted.get()
    }
}

/// Structured logger for exporter events
///
/// Every event carries the metadata endpoint so logs from several
/// exporters in one cluster can be told apart.
#[derive(Clone)]
pub struct StructuredLogger {
    endpoint: String,
}

impl StructuredLogger {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn log_startup(&self, version: &str, listen_addr: &str, clock_ticks: u64) {
        info!(
            event = "exporter_started",
            endpoint = %self.endpoint,
            version = %version,
            listen_addr = %listen_addr,
            clock_ticks = clock_ticks,
            "ECS exporter started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "exporter_shutdown",
            endpoint = %self.endpoint,
            reason = %reason,
            "ECS exporter shutting down"
        );
    }

    pub fn log_fetch_failure(&self, document: Document, error: &FetchError) {
        warn!(
            event = "fetch_failed",
            endpoint = %self.endpoint,
            document = %document,
            error = %error,
            "Failed to retrieve metadata document"
        );
    }

    pub fn log_diagnostic(&self, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::MissingStats {
                container_id,
                container_name,
            } => {
                info!(
                    event = "container_stats_missing",
                    endpoint = %self.endpoint,
                    container_id = %container_id,
                    container_name = %container_name,
                    "Couldn't find container in task stats"
                );
            }
            Diagnostic::MissingMemoryLimit { container_name } => {
                warn!(
                    event = "container_memory_limit_missing",
                    endpoint = %self.endpoint,
                    container_name = %container_name,
                    "Neither container nor task defines a memory limit"
                );
            }
        }
    }

    pub fn log_exposition_conflict(&self, error: &ExpositionError) {
        warn!(
            event = "exposition_conflict",
            endpoint = %self.endpoint,
            error = %error,
            "Rejected scrape with conflicting samples, keeping previous metrics"
        );
    }

    pub fn log_scrape_complete(&self, containers: usize, samples: usize, elapsed_ms: u128) {
        debug!(
            event = "scrape_completed",
            endpoint = %self.endpoint,
            containers = containers,
            samples = samples,
            elapsed_ms = elapsed_ms,
            "Scrape complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_metrics_creation() {
        let metrics = ExporterMetrics::new();

        metrics.observe_scrape_duration(0.01);
        metrics.inc_containers_skipped("missing_stats");
        metrics.inc_exposition_conflicts();
        metrics.set_observations(42);
        metrics.set_last_scrape_success(true);
        metrics.set_build_info("0.1.0", 100);

        let before = metrics.fetch_errors(Document::TaskStats);
        metrics.inc_fetch_errors(Document::TaskStats);
        assert!(metrics.fetch_errors(Document::TaskStats) > before);
    }

    #[test]
    fn test_memory_limits_omitted_counts_separately() {
        let metrics = ExporterMetrics::new();

        let omitted = metrics.memory_limits_omitted();
        metrics.inc_memory_limits_omitted();

        assert!(metrics.memory_limits_omitted() > omitted);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("http://169.254.170.2/v4/abc");
        assert_eq!(logger.endpoint, "http://169.254.170.2/v4/abc");
    }
}
