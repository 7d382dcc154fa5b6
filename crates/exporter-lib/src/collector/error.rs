//! Errors of the metadata fetch and scrape cycle

use crate::exposition::ExpositionError;
use std::time::Duration;
use thiserror::Error;

/// Failure to retrieve one metadata document
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{var} is not set; not running on ECS?")]
    EndpointNotSet { var: &'static str },

    #[error("invalid metadata endpoint {endpoint:?}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url}: unexpected status {status}: {body:?}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{document} request timed out after {after:?}")]
    Timeout {
        document: Document,
        after: Duration,
    },
}

/// The two documents fetched per scrape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Document {
    TaskMetadata,
    TaskStats,
}

impl Document {
    pub fn as_str(self) -> &'static str {
        match self {
            Document::TaskMetadata => "task_metadata",
            Document::TaskStats => "task_stats",
        }
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a whole scrape cycle
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to retrieve {document}: {source}")]
    Fetch {
        document: Document,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Exposition(#[from] ExpositionError),
}
