//! Completion and embedding provider implementations.

pub mod mock;
pub mod openai;

pub use mock::{content_chunks, text_completion, MockChatClient, MockEmbeddingsClient};
pub use openai::OpenAiClient;
