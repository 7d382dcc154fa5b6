//! Scrape cycle
//!
//! One scrape fetches the task metadata, then the task stats, projects both
//! and publishes the result. A failed fetch ends the cycle before anything
//! is published, so the previous snapshot stays exposed. The deadline bounds
//! both requests together.

use super::error::{Document, FetchError, ScrapeError};
use super::MetadataSource;
use crate::exposition::TaskMetricsCollector;
use crate::health::{components, HealthRegistry};
use crate::models::{TaskMetadata, TaskStats};
use crate::observability::{ExporterMetrics, StructuredLogger};
use crate::projection::{Diagnostic, Projector};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of a successful scrape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub containers: usize,
    pub skipped_containers: usize,
    pub samples: usize,
}

/// Runs scrape cycles against a metadata source
pub struct Scraper {
    source: Arc<dyn MetadataSource>,
    projector: Projector,
    sink: TaskMetricsCollector,
    metrics: ExporterMetrics,
    logger: StructuredLogger,
    health: HealthRegistry,
    deadline: Duration,
    unhealthy_after: u32,
    consecutive_failures: AtomicU32,
}

impl Scraper {
    /// Run one scrape cycle
    pub async fn scrape(&self) -> Result<ScrapeSummary, ScrapeError> {
        let start = Instant::now();
        let result = self.run_cycle().await;

        self.metrics
            .observe_scrape_duration(start.elapsed().as_secs_f64());
        self.metrics.set_last_scrape_success(result.is_ok());

        if let Ok(summary) = &result {
            self.logger.log_scrape_complete(
                summary.containers,
                summary.samples,
                start.elapsed().as_millis(),
            );
        }

        result
    }

    async fn run_cycle(&self) -> Result<ScrapeSummary, ScrapeError> {
        let (metadata, stats) = self.fetch_documents().await?;

        let projection = self.projector.project(&metadata, &stats);

        let mut skipped_containers = 0;
        for diagnostic in &projection.diagnostics {
            self.logger.log_diagnostic(diagnostic);
            match diagnostic {
                Diagnostic::MissingStats { .. } => {
                    skipped_containers += 1;
                    self.metrics.inc_containers_skipped("missing_stats");
                }
                Diagnostic::MissingMemoryLimit { .. } => {
                    self.metrics.inc_memory_limits_omitted();
                }
            }
        }

        let samples = match self.sink.publish(projection.observations) {
            Ok(samples) => samples,
            Err(e) => {
                self.logger.log_exposition_conflict(&e);
                self.metrics.inc_exposition_conflicts();
                self.health
                    .set_degraded(components::EXPOSITION, e.to_string())
                    .await;
                return Err(e.into());
            }
        };
        self.health.set_healthy(components::EXPOSITION).await;
        self.metrics.set_observations(samples as i64);

        Ok(ScrapeSummary {
            containers: metadata.containers.len(),
            skipped_containers,
            samples,
        })
    }

    /// Fetch both documents under one deadline
    ///
    /// Stats are only requested once the metadata has arrived. After
    /// `unhealthy_after` failed cycles in a row the metadata client is
    /// reported unhealthy rather than degraded.
    async fn fetch_documents(&self) -> Result<(TaskMetadata, TaskStats), ScrapeError> {
        let mut pending = Document::TaskMetadata;
        let fetched = tokio::time::timeout(self.deadline, async {
            let metadata = self.source.task_metadata().await?;
            pending = Document::TaskStats;
            let stats = self.source.task_stats().await?;
            Ok::<_, FetchError>((metadata, stats))
        })
        .await;

        let source = match fetched {
            Ok(Ok(documents)) => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                self.health.set_healthy(components::METADATA_CLIENT).await;
                return Ok(documents);
            }
            Ok(Err(source)) => source,
            Err(_) => FetchError::Timeout {
                document: pending,
                after: self.deadline,
            },
        };

        self.logger.log_fetch_failure(pending, &source);
        self.metrics.inc_fetch_errors(pending);

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.unhealthy_after {
            self.health
                .set_unhealthy(components::METADATA_CLIENT, source.to_string())
                .await;
        } else {
            self.health
                .set_degraded(components::METADATA_CLIENT, source.to_string())
                .await;
        }

        Err(ScrapeError::Fetch {
            document: pending,
            source,
        })
    }
}

/// Builder for a `Scraper`
pub struct ScraperBuilder {
    source: Option<Arc<dyn MetadataSource>>,
    projector: Projector,
    sink: Option<TaskMetricsCollector>,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
    deadline: Duration,
    unhealthy_after: u32,
}

impl ScraperBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            projector: Projector::default(),
            sink: None,
            health: None,
            logger: None,
            deadline: Duration::from_secs(10),
            unhealthy_after: 3,
        }
    }

    /// Set the metadata source
    pub fn source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the projector (carries the clock tick rate)
    pub fn projector(mut self, projector: Projector) -> Self {
        self.projector = projector;
        self
    }

    /// Set the exposition sink
    pub fn sink(mut self, sink: TaskMetricsCollector) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Set the deadline for fetching both documents
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Failed cycles in a row before the metadata client counts as unhealthy
    pub fn unhealthy_after(mut self, failures: u32) -> Self {
        self.unhealthy_after = failures.max(1);
        self
    }

    pub fn build(self) -> Result<Scraper, BuildError> {
        let source = self.source.ok_or(BuildError::MissingSource)?;
        let sink = self.sink.ok_or(BuildError::MissingSink)?;

        Ok(Scraper {
            source,
            projector: self.projector,
            sink,
            metrics: ExporterMetrics::new(),
            logger: self
                .logger
                .unwrap_or_else(|| StructuredLogger::new("unknown")),
            health: self.health.unwrap_or_default(),
            deadline: self.deadline,
            unhealthy_after: self.unhealthy_after,
            consecutive_failures: AtomicU32::new(0),
        })
    }
}

impl Default for ScraperBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Missing required builder input
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("a metadata source is required")]
    MissingSource,
    #[error("an exposition sink is required")]
    MissingSink,
}
