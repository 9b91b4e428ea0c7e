//! Search backend abstraction.
//!
//! The document index (lexical/vector/hybrid retrieval, semantic reranking)
//! is an external collaborator consumed through the `SearchBackend` trait.
//! This module also ships a thin HTTP client for JSON search services and a
//! scripted mock for tests.

use std::sync::Mutex;

use ragchat_core::{AppError, AppResult};
use serde::Deserialize;

use crate::types::{RetrievedSource, SearchOptions};

/// Trait for search backends.
///
/// A search returns a ranked, possibly empty, list of sources. Thresholding
/// and semantic reranking happen inside the backend; callers only forward
/// the parameters.
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    /// Execute one search call.
    async fn search(&self, options: &SearchOptions) -> AppResult<Vec<RetrievedSource>>;
}

/// Search service response format.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<RetrievedSource>,
}

/// HTTP search backend client.
pub struct HttpSearchBackend {
    /// Base URL of the search service
    endpoint: String,

    /// Index name
    index: String,

    /// API key, if the service requires one
    api_key: Option<String>,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpSearchBackend {
    /// Create a new client for the given service and index.
    pub fn new(
        endpoint: impl Into<String>,
        index: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            index: index.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(&self, options: &SearchOptions) -> AppResult<Vec<RetrievedSource>> {
        let url = format!("{}/indexes/{}/search", self.endpoint, self.index);

        tracing::info!(
            "Searching index '{}' (top: {}, vectors: {})",
            self.index,
            options.top,
            options.vectors.len()
        );

        let mut builder = self.client.post(&url).json(options);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AppError::Search(format!("Failed to send search request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Search(format!(
                "Search backend error ({}): {}",
                status, error_text
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Search(format!("Failed to parse search response: {}", e)))?;

        tracing::debug!("Search returned {} results", parsed.results.len());
        Ok(parsed.results)
    }
}

/// Mock search backend replaying canned results.
///
/// Records every `SearchOptions` bundle it receives so tests can assert on
/// the exact parameters the orchestrator forwarded.
#[derive(Default)]
pub struct MockSearchBackend {
    results: Vec<RetrievedSource>,
    requests: Mutex<Vec<SearchOptions>>,
}

impl MockSearchBackend {
    /// Create a mock backend returning the given results on every call.
    pub fn new(results: Vec<RetrievedSource>) -> Self {
        Self {
            results,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// All search calls received so far, in order.
    pub fn requests(&self) -> Vec<SearchOptions> {
        self.requests
            .lock()
            .expect("mock state lock poisoned")
            .clone()
    }
}

#[async_trait::async_trait]
impl SearchBackend for MockSearchBackend {
    async fn search(&self, options: &SearchOptions) -> AppResult<Vec<RetrievedSource>> {
        self.requests
            .lock()
            .expect("mock state lock poisoned")
            .push(options.clone());
        Ok(self.results.clone())
    }
}
