//! OpenAI-compatible provider implementation.
//!
//! Speaks the `/chat/completions` and `/embeddings` REST shape used by
//! OpenAI-style completion services. Streaming responses arrive as
//! server-sent events terminated by a `[DONE]` sentinel.

use eventsource_stream::Eventsource;
use futures::StreamExt;
use ragchat_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::client::{
    ChatClient, ChatCompletion, ChatCompletionChunk, ChatRequest, ChatStream, EmbeddingsClient,
};

/// Embeddings API request format.
#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

/// Embeddings API response format.
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI-compatible chat and embeddings client.
pub struct OpenAiClient {
    /// Base URL of the service (e.g., "https://api.example.test/v1")
    base_url: String,

    /// Bearer token, if the service requires one
    api_key: Option<String>,

    /// Model used for text embeddings
    embedding_model: String,

    /// Model used for image-modality embeddings, if deployed
    image_embedding_model: Option<String>,

    /// HTTP client
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a new client for the given endpoint.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            embedding_model: "text-embedding-ada-002".to_string(),
            image_embedding_model: None,
            client: reqwest::Client::new(),
        }
    }

    /// Set the embedding model identifiers.
    pub fn with_embedding_models(
        mut self,
        text_model: impl Into<String>,
        image_model: Option<String>,
    ) -> Self {
        self.embedding_model = text_model.into();
        self.image_embedding_model = image_model;
        self
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.post(&url);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    async fn check_status(response: reqwest::Response) -> AppResult<reqwest::Response> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "Completion service error ({}): {}",
                status, error_text
            )));
        }
        Ok(response)
    }

    async fn embed(&self, model: &str, input: &str) -> AppResult<Vec<f32>> {
        tracing::debug!("Requesting embedding with model {}", model);

        let response = self
            .post("/embeddings")
            .json(&EmbeddingsRequest { model, input })
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send embeddings request: {}", e)))?;

        let response = Self::check_status(response).await?;

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse embeddings response: {}", e)))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AppError::Llm("Embeddings response contained no data".to_string()))
    }
}

#[async_trait::async_trait]
impl ChatClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatCompletion> {
        tracing::info!("Sending completion request to {}", self.base_url);
        tracing::debug!("Model: {}, messages: {}", request.model, request.messages.len());

        let response = self
            .post("/chat/completions")
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send completion request: {}", e)))?;

        let response = Self::check_status(response).await?;

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse completion response: {}", e)))?;

        tracing::info!("Received completion");
        Ok(completion)
    }

    async fn stream(&self, request: &ChatRequest) -> AppResult<ChatStream> {
        tracing::info!("Starting streaming request to {}", self.base_url);

        let mut request = request.clone();
        request.stream = true;

        let response = self
            .post("/chat/completions")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send streaming request: {}", e)))?;

        let response = Self::check_status(response).await?;

        let stream = response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move {
                match event {
                    Ok(event) => {
                        if event.data == "[DONE]" {
                            None
                        } else {
                            Some(
                                serde_json::from_str::<ChatCompletionChunk>(&event.data).map_err(
                                    |e| {
                                        AppError::Llm(format!(
                                            "Failed to parse stream event: {}",
                                            e
                                        ))
                                    },
                                ),
                            )
                        }
                    }
                    Err(e) => Some(Err(AppError::Llm(format!("Stream error: {}", e)))),
                }
            });

        Ok(Box::pin(stream))
    }
}

#[async_trait::async_trait]
impl EmbeddingsClient for OpenAiClient {
    async fn embed_text(&self, text: &str) -> AppResult<Vec<f32>> {
        self.embed(&self.embedding_model, text).await
    }

    async fn embed_image_query(&self, text: &str) -> AppResult<Vec<f32>> {
        let model = self.image_embedding_model.as_deref().ok_or_else(|| {
            AppError::Config("No image embedding model is configured".to_string())
        })?;
        self.embed(model, text).await
    }
}
