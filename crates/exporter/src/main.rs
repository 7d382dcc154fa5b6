//! ECS Exporter - Prometheus exporter for ECS task metadata
//!
//! This binary runs as a sidecar in an ECS task, reading the task metadata
//! endpoint on every scrape and exposing the task and its containers as
//! Prometheus metrics.

use anyhow::{Context, Result};
use clap::Parser;
use exporter_lib::{
    health::{components, HealthRegistry},
    observability::{ExporterMetrics, StructuredLogger},
    ClockTickRate, MetadataClient, Projector, ScraperBuilder, TaskMetricsCollector,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let cli = config::Cli::parse();
    let config = config::ExporterConfig::load(&cli)?;

    let timeout = config.request_timeout();
    let client = match &config.metadata_endpoint {
        Some(endpoint) => MetadataClient::new(endpoint, timeout),
        None => MetadataClient::from_environment(timeout),
    }
    .context("failed to configure the metadata client")?;
    info!(endpoint = %client.endpoint(), "Exporter configured");

    let clock_ticks = ClockTickRate::from_host();

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::METADATA_CLIENT).await;
    health_registry.register(components::EXPOSITION).await;

    // Initialize metrics
    let metrics = ExporterMetrics::new();
    metrics.set_build_info(EXPORTER_VERSION, clock_ticks.ticks_per_second());

    let bind_addr = config.bind_addr();
    let logger = StructuredLogger::new(client.endpoint());
    logger.log_startup(EXPORTER_VERSION, &bind_addr, clock_ticks.ticks_per_second());

    // Task metrics share the default registry with the self-metrics
    let registry = prometheus::default_registry().clone();
    let sink = TaskMetricsCollector::new()?;
    registry
        .register(Box::new(sink.clone()))
        .context("failed to register the task collector")?;

    let scraper = ScraperBuilder::new()
        .source(Arc::new(client))
        .projector(Projector::new(clock_ticks))
        .sink(sink)
        .health(health_registry.clone())
        .logger(logger.clone())
        .deadline(timeout)
        .build()?;

    let app_state = Arc::new(api::AppState::new(scraper, health_registry.clone(), registry));

    // Mark exporter as ready after initialization
    health_registry.set_ready(true).await;

    let shutdown_logger = logger.clone();
    api::serve(&bind_addr, app_state, async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_logger.log_shutdown("SIGINT received");
        }
    })
    .await?;

    info!("Shutting down");

    Ok(())
}
