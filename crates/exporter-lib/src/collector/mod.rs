//! Task metrics collection
//!
//! This module fetches the task metadata and task stats documents from the
//! ECS metadata endpoint and runs one projection per scrape. There is no
//! background loop: every cycle is triggered by an incoming scrape.

mod client;
mod error;
mod scrape;


pub use client::{MetadataClient, ENDPOINT_ENV};
pub use error::{Document, FetchError, ScrapeError};
pub use scrape::{BuildError, ScrapeSummary, Scraper, ScraperBuilder};

use crate::models::{TaskMetadata, TaskStats};

pub use async_trait::async_trait;

/// Source of the two documents consumed by a scrape
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Retrieve the task metadata document
    async fn task_metadata(&self) -> Result<TaskMetadata, FetchError>;

    /// Retrieve the per-container stats document
    async fn task_stats(&self) -> Result<TaskStats, FetchError>;
}
