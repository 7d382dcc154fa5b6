//! Exporter library for ECS task metrics
//!
//! This crate provides the core functionality for:
//! - Fetching task metadata and stats from the ECS metadata endpoint
//! - Projecting both documents into Prometheus observations
//! - Serving the latest snapshot through a Prometheus collector
//! - Health checks and observability

pub mod collector;
pub mod exposition;
pub mod health;
pub mod models;
pub mod observability;
pub mod projection;

pub use collector::{MetadataClient, MetadataSource, ScrapeError, Scraper, ScraperBuilder};
pub use exposition::{ExpositionError, TaskMetricsCollector};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ExporterMetrics, StructuredLogger};
pub use projection::{ClockTickRate, Projection, Projector};
