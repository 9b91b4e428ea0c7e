//! Scripted mock providers for testing and development.
//!
//! `MockChatClient` replays queued completions and chunk scripts while
//! recording every request it receives, so pipeline tests can assert on the
//! exact prompts sent to the completion service. `MockEmbeddingsClient`
//! produces deterministic content-dependent vectors.

use std::collections::VecDeque;
use std::sync::Mutex;

use ragchat_core::{AppError, AppResult};

use crate::client::{
    ChatChoice, ChatClient, ChatCompletion, ChatCompletionChunk, ChatDelta, ChatRequest,
    ChatStream, ChunkChoice, EmbeddingsClient,
};
use crate::message::ChatMessage;

/// Build a single-choice completion carrying plain assistant text.
pub fn text_completion(content: impl Into<String>) -> ChatCompletion {
    ChatCompletion {
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage::assistant(content),
            finish_reason: Some("stop".to_string()),
        }],
    }
}

/// Build a chunk script from plain content deltas.
pub fn content_chunks(parts: &[&str]) -> Vec<ChatCompletionChunk> {
    parts
        .iter()
        .map(|part| ChatCompletionChunk {
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChatDelta {
                    role: None,
                    content: Some((*part).to_string()),
                },
                finish_reason: None,
            }],
        })
        .collect()
}

/// Mock chat client replaying scripted responses.
#[derive(Default)]
pub struct MockChatClient {
    completions: Mutex<VecDeque<ChatCompletion>>,
    chunk_scripts: Mutex<VecDeque<Vec<ChatCompletionChunk>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockChatClient {
    /// Create an empty mock client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a completion for the next `complete` call.
    pub fn enqueue_completion(&self, completion: ChatCompletion) {
        self.completions
            .lock()
            .expect("mock state lock poisoned")
            .push_back(completion);
    }

    /// Queue a chunk script for the next `stream` call.
    pub fn enqueue_chunks(&self, chunks: Vec<ChatCompletionChunk>) {
        self.chunk_scripts
            .lock()
            .expect("mock state lock poisoned")
            .push_back(chunks);
    }

    /// All requests received so far, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .expect("mock state lock poisoned")
            .clone()
    }

    fn record(&self, request: &ChatRequest) {
        self.requests
            .lock()
            .expect("mock state lock poisoned")
            .push(request.clone());
    }
}

#[async_trait::async_trait]
impl ChatClient for MockChatClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatCompletion> {
        self.record(request);
        self.completions
            .lock()
            .expect("mock state lock poisoned")
            .pop_front()
            .ok_or_else(|| AppError::Llm("Mock client has no queued completion".to_string()))
    }

    async fn stream(&self, request: &ChatRequest) -> AppResult<ChatStream> {
        self.record(request);
        let chunks = self
            .chunk_scripts
            .lock()
            .expect("mock state lock poisoned")
            .pop_front()
            .ok_or_else(|| AppError::Llm("Mock client has no queued chunk script".to_string()))?;

        Ok(Box::pin(futures::stream::iter(
            chunks.into_iter().map(Ok),
        )))
    }
}

/// Mock embeddings provider.
///
/// Generates deterministic embeddings from word hashes. Not semantically
/// meaningful, but consistent and content-dependent, which is enough for
/// pipeline tests. Image-modality queries are seeded differently so the two
/// modalities produce distinct vectors for the same text.
#[derive(Debug, Clone)]
pub struct MockEmbeddingsClient {
    dimensions: usize,
}

impl MockEmbeddingsClient {
    /// Create a mock provider with the given vector width.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn generate(&self, text: &str, seed: u64) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        for word in text.to_lowercase().split_whitespace() {
            let hash = word
                .bytes()
                .fold(seed, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            let dim = (hash as usize) % self.dimensions;
            embedding[dim] += 1.0;
        }

        // Normalize to unit vector
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingsClient for MockEmbeddingsClient {
    async fn embed_text(&self, text: &str) -> AppResult<Vec<f32>> {
        Ok(self.generate(text, 17))
    }

    async fn embed_image_query(&self, text: &str) -> AppResult<Vec<f32>> {
        Ok(self.generate(text, 97))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client_replays_completion() {
        let client = MockChatClient::new();
        client.enqueue_completion(text_completion("scripted answer"));

        let request = ChatRequest::new("gpt-35-turbo", vec![ChatMessage::user("hi")]);
        let completion = client.complete(&request).await.unwrap();

        assert_eq!(
            completion.first_message().and_then(|m| m.text_content()),
            Some("scripted answer")
        );
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_client_exhausted() {
        let client = MockChatClient::new();
        let request = ChatRequest::new("gpt-35-turbo", vec![ChatMessage::user("hi")]);
        assert!(client.complete(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_client_streams_chunks() {
        use futures::StreamExt;

        let client = MockChatClient::new();
        client.enqueue_chunks(content_chunks(&["Hello", " world"]));

        let request = ChatRequest::new("gpt-35-turbo", vec![ChatMessage::user("hi")]);
        let mut stream = client.stream(&request).await.unwrap();

        let mut collected = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            if let Some(content) = chunk.choices[0].delta.content.as_deref() {
                collected.push_str(content);
            }
        }

        assert_eq!(collected, "Hello world");
    }

    #[tokio::test]
    async fn test_mock_embeddings_deterministic() {
        let client = MockEmbeddingsClient::new(128);
        let a = client.embed_text("lease termination notice").await.unwrap();
        let b = client.embed_text("lease termination notice").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
    }

    #[tokio::test]
    async fn test_mock_embeddings_modalities_differ() {
        let client = MockEmbeddingsClient::new(128);
        let text = client.embed_text("lease termination").await.unwrap();
        let image = client.embed_image_query("lease termination").await.unwrap();
        assert_ne!(text, image);
    }

    #[tokio::test]
    async fn test_mock_embeddings_normalized() {
        let client = MockEmbeddingsClient::new(64);
        let v = client.embed_text("hello world").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }
}
