//! Public response shapes.
//!
//! Explicit structs for the non-streaming response and the streaming event
//! union, replacing ad-hoc maps so every consumer sees the same shape.

use futures::Stream;
use ragchat_core::AppResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;

use ragchat_llm::{ChatMessage, Role};

/// Diagnostic audit record of one pipeline stage.
///
/// Thought steps are append-only and for display only; they never influence
/// control flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtStep {
    /// Stage title
    pub title: String,

    /// Stage input (prompt messages, query text, raw results)
    pub description: Value,

    /// Stage parameters, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub props: Option<Value>,
}

impl ThoughtStep {
    /// Create a new thought step.
    pub fn new(title: impl Into<String>, description: Value, props: Option<Value>) -> Self {
        Self {
            title: title.into(),
            description,
            props,
        }
    }
}

/// The sources an answer was grounded on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataPoints {
    /// Rendered text source lines ("citation: passage")
    pub text: Vec<String>,

    /// Resolved image URLs, for the vision approach
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// Diagnostics and grounding context attached to every response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseContext {
    /// Sources the answer was grounded on
    pub data_points: DataPoints,

    /// Ordered pipeline audit trail
    pub thoughts: Vec<ThoughtStep>,

    /// Follow-up questions extracted from the answer, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followup_questions: Option<Vec<String>>,
}

/// A complete, non-streaming answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The assistant's answer message
    pub message: ChatMessage,

    /// Grounding context and diagnostics
    pub context: ResponseContext,

    /// Caller-supplied session state, echoed back unchanged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_state: Option<Value>,
}

/// One event of a streaming answer.
///
/// Ordering guarantee: exactly one `Context` event precedes all `Delta`
/// events; at most one `FollowupQuestions` event follows them all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Initial event carrying the assistant role marker and the grounding
    /// context, so callers can render citations before the first token
    Context {
        role: Role,
        context: ResponseContext,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_state: Option<Value>,
    },

    /// Incremental visible answer content
    Delta { content: String },

    /// Final event carrying only the extracted follow-up questions
    FollowupQuestions { questions: Vec<String> },
}

/// Stream of answer events.
pub type ChatEventStream = Pin<Box<dyn Stream<Item = AppResult<ChatEvent>> + Send>>;
