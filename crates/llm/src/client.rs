//! Chat client abstraction and request/response types.
//!
//! This module defines the core abstractions for interacting with chat
//! completion and embedding services.

use futures::Stream;
use ragchat_core::AppResult;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::message::{ChatMessage, Role, Tool};

/// Chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier (e.g., "gpt-35-turbo")
    pub model: String,

    /// Ordered conversation turns
    pub messages: Vec<ChatMessage>,

    /// Temperature for sampling (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Number of completions to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,

    /// Enable streaming responses
    #[serde(default)]
    pub stream: bool,

    /// Tools offered to the model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
}

impl ChatRequest {
    /// Create a new chat request with required fields.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            n: None,
            stream: false,
            tools: None,
        }
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the number of completions.
    pub fn with_n(mut self, n: u32) -> Self {
        self.n = Some(n);
        self
    }

    /// Enable or disable streaming for this request.
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Offer tools to the model.
    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// A completed (non-streaming) chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Completion choices; the pipeline only ever requests one
    pub choices: Vec<ChatChoice>,
}

impl ChatCompletion {
    /// The first choice's message, if the response carried any.
    pub fn first_message(&self) -> Option<&ChatMessage> {
        self.choices.first().map(|choice| &choice.message)
    }
}

/// One completion choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    /// Choice index
    #[serde(default)]
    pub index: u32,

    /// The generated message
    pub message: ChatMessage,

    /// Why generation stopped, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// One event from a streaming chat response.
///
/// Some upstream protocol versions emit an initial event with an empty
/// `choices` list; consumers must tolerate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Delta choices; may be empty
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// One choice within a streaming event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Choice index
    #[serde(default)]
    pub index: u32,

    /// Incremental content
    pub delta: ChatDelta,

    /// Why generation stopped, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Incremental message content within a streaming event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatDelta {
    /// Role marker (first event of a stream)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Incremental text content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Stream of chat completion events.
pub type ChatStream = Pin<Box<dyn Stream<Item = AppResult<ChatCompletionChunk>> + Send>>;

/// Trait for chat completion providers.
///
/// This trait abstracts the underlying completion service and provides a
/// unified interface for non-streaming and streaming requests. Implementors
/// must propagate backend failures (quota, timeouts) unchanged; retry policy
/// belongs to the backend, not here.
#[async_trait::async_trait]
pub trait ChatClient: Send + Sync {
    /// Get the provider name (e.g., "openai", "mock").
    fn provider_name(&self) -> &str;

    /// Perform a non-streaming chat completion.
    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatCompletion>;

    /// Perform a streaming chat completion.
    ///
    /// Dropping the returned stream cancels the underlying request and
    /// releases its resources.
    async fn stream(&self, request: &ChatRequest) -> AppResult<ChatStream>;
}

/// Trait for embedding providers.
///
/// Embeddings come in two modalities: ordinary text embeddings, and
/// image-modality embeddings computed from query text for indexes that store
/// image vectors.
#[async_trait::async_trait]
pub trait EmbeddingsClient: Send + Sync {
    /// Compute a text embedding for the given input.
    async fn embed_text(&self, text: &str) -> AppResult<Vec<f32>>;

    /// Compute an image-modality embedding for the given query text.
    async fn embed_image_query(&self, text: &str) -> AppResult<Vec<f32>>;
}
