//! HTTP client for the ECS task metadata endpoint (v4)

use super::error::{Document, FetchError};
use super::MetadataSource;
use crate::models::{TaskMetadata, TaskStats};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Environment variable ECS injects into every container of a task
pub const ENDPOINT_ENV: &str = "ECS_CONTAINER_METADATA_URI_V4";

/// Longest response body excerpt carried by a status error
const ERROR_BODY_LIMIT: usize = 100;

/// Metadata endpoint client
#[derive(Debug, Clone)]
pub struct MetadataClient {
    client: Client,
    endpoint: String,
}

impl MetadataClient {
    /// Create a client for the given endpoint
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, FetchError> {
        Url::parse(endpoint).map_err(|source| FetchError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            source,
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| FetchError::Transport {
                url: endpoint.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client for the endpoint advertised in the environment
    pub fn from_environment(timeout: Duration) -> Result<Self, FetchError> {
        match std::env::var(ENDPOINT_ENV) {
            Ok(endpoint) if !endpoint.is_empty() => Self::new(&endpoint, timeout),
            _ => Err(FetchError::EndpointNotSet { var: ENDPOINT_ENV }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url_for(&self, document: Document) -> String {
        match document {
            Document::TaskMetadata => format!("{}/task", self.endpoint),
            Document::TaskStats => format!("{}/task/stats", self.endpoint),
        }
    }

    async fn get<T: DeserializeOwned>(&self, document: Document) -> Result<T, FetchError> {
        let url = self.url_for(document);
        debug!(url = %url, document = %document, "Requesting metadata document");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;

        if !status.is_success() {
            let body: String = String::from_utf8_lossy(&body)
                .chars()
                .take(ERROR_BODY_LIMIT)
                .collect();
            return Err(FetchError::Status { url, status, body });
        }

        serde_json::from_slice(&body).map_err(|source| FetchError::Decode { url, source })
    }
}

#[async_trait]
impl MetadataSource for MetadataClient {
    async fn task_metadata(&self) -> Result<TaskMetadata, FetchError> {
        self.get(Document::TaskMetadata).await
    }

    async fn task_stats(&self) -> Result<TaskStats, FetchError> {
        self.get(Document::TaskStats).await
    }
}
