//! Image reference resolution.
//!
//! Sources backed by page renders can contribute images to the vision
//! answer prompt. Resolution lives behind the `ImageStore` collaborator;
//! a missing image is `Ok(None)` and never an error; callers simply omit
//! it from the prompt and the response's image list.

use std::collections::HashMap;

use ragchat_core::AppResult;

use crate::types::RetrievedSource;

/// Trait for resolving a source's image reference.
#[async_trait::async_trait]
pub trait ImageStore: Send + Sync {
    /// Resolve the image URL for a source, or `None` when it has no image.
    async fn fetch_image(&self, source: &RetrievedSource) -> AppResult<Option<String>>;
}

/// Image store for deployments without page-render storage; every source
/// resolves to no image.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImageStore;

#[async_trait::async_trait]
impl ImageStore for NoImageStore {
    async fn fetch_image(&self, _source: &RetrievedSource) -> AppResult<Option<String>> {
        Ok(None)
    }
}

/// In-memory image store for tests, keyed by source id.
#[derive(Debug, Default)]
pub struct MockImageStore {
    urls: HashMap<String, String>,
}

impl MockImageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image URL for a source id.
    pub fn insert(mut self, source_id: impl Into<String>, url: impl Into<String>) -> Self {
        self.urls.insert(source_id.into(), url.into());
        self
    }
}

#[async_trait::async_trait]
impl ImageStore for MockImageStore {
    async fn fetch_image(&self, source: &RetrievedSource) -> AppResult<Option<String>> {
        Ok(self.urls.get(&source.id).cloned())
    }
}
