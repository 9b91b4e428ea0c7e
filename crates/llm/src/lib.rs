//! LLM integration crate for the ragchat pipeline.
//!
//! This crate provides a provider-agnostic abstraction for chat completion
//! and embedding services, plus the token-accounting helpers the prompt
//! assembler budgets against.
//!
//! # Providers
//! - **OpenAI-compatible**: any service speaking the `/chat/completions` and
//!   `/embeddings` REST shape
//! - **Mock**: scripted in-memory provider for tests
//!
//! # Example
//! ```no_run
//! use ragchat_llm::{ChatClient, ChatRequest, message::ChatMessage, providers::OpenAiClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenAiClient::new("https://api.example.test/v1", None);
//! let request = ChatRequest::new(
//!     "gpt-35-turbo",
//!     vec![ChatMessage::user("Hello, world!")],
//! );
//! let completion = client.complete(&request).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod message;
pub mod providers;
pub mod tokens;

// Re-export main types
pub use client::{
    ChatChoice, ChatClient, ChatCompletion, ChatCompletionChunk, ChatDelta, ChatRequest,
    ChatStream, ChunkChoice, EmbeddingsClient,
};
pub use message::{
    ChatMessage, ContentPart, FunctionCall, ImageDetail, ImageUrl, MessageContent, Role, Tool,
    ToolCall,
};
pub use providers::OpenAiClient;
