//! Conversation-to-answer orchestration for the ragchat pipeline.
//!
//! This crate holds the multi-step control flow that turns chat history into
//! a grounded answer:
//!
//! 1. The conversation is condensed into a standalone search query
//!    ([`distiller`]).
//! 2. Relevant sources are retrieved through the retrieval orchestrator.
//! 3. A token-bounded answer prompt is assembled from the distilled query,
//!    the rendered sources and as much history as fits ([`assembler`]).
//! 4. The model's output, streamed or not, is post-processed into the
//!    public response shape: visible answer, citations, follow-up questions
//!    ([`runner`], [`followups`]).
//!
//! Answer generation is polymorphic over [`approach::ChatApproach`]; the
//! text-only and vision-augmented variants are selected at construction
//! time.

pub mod approach;
pub mod assembler;
pub mod distiller;
pub mod followups;
pub mod overrides;
pub mod response;
pub mod runner;
pub mod text;
pub mod vision;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use approach::{ChatApproach, FinalCall};
pub use overrides::{ChatOverrides, VisionInput};
pub use response::{
    ChatEvent, ChatEventStream, ChatResponse, DataPoints, ResponseContext, ThoughtStep,
};
pub use runner::{run_with_streaming, run_without_streaming};
pub use text::TextChatApproach;
pub use vision::VisionChatApproach;
