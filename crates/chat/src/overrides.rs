//! Per-request override knobs.
//!
//! Callers tune one request at a time through `ChatOverrides`; anything left
//! unset falls back to the pipeline defaults. The bundle is deserialized
//! from the request context, so every field is optional on the wire.

use serde::{Deserialize, Serialize};

use ragchat_retrieval::RetrievalMode;

pub use ragchat_retrieval::AuthClaims;

/// Which source modalities the vision approach feeds to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VisionInput {
    /// Text sources only
    Texts,
    /// Image sources only
    Images,
    /// Both modalities
    TextAndImages,
}

impl VisionInput {
    /// Whether text sources are included.
    pub fn include_texts(&self) -> bool {
        matches!(self, VisionInput::Texts | VisionInput::TextAndImages)
    }

    /// Whether image sources are included.
    pub fn include_images(&self) -> bool {
        matches!(self, VisionInput::Images | VisionInput::TextAndImages)
    }
}

/// Request-scoped overrides for one conversation turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatOverrides {
    /// Retrieval mode; defaults to hybrid
    pub retrieval_mode: Option<RetrievalMode>,

    /// Vector fields to query; defaults to the text embedding field
    pub vector_fields: Option<Vec<String>>,

    /// Enable the backend's semantic reranker (text retrieval only)
    pub semantic_ranker: bool,

    /// Enable backend semantic captions (text retrieval only)
    pub semantic_captions: bool,

    /// Number of sources to retrieve; defaults to 3
    pub top: Option<usize>,

    /// Minimum search score forwarded to the backend
    pub minimum_search_score: Option<f64>,

    /// Minimum reranker score forwarded to the backend
    pub minimum_reranker_score: Option<f64>,

    /// Category to exclude from retrieval
    pub exclude_category: Option<String>,

    /// System prompt override. A value starting with ">>>" is appended into
    /// the default template instead of replacing it; templates may reference
    /// `{{injected_prompt}}` and `{{follow_up_questions_prompt}}`.
    pub prompt_template: Option<String>,

    /// Ask the model to propose follow-up questions
    pub suggest_followup_questions: bool,

    /// Sampling temperature; defaults vary by approach
    pub temperature: Option<f32>,

    /// Source modalities for the vision approach; defaults to both
    pub vision_input: Option<VisionInput>,
}

impl ChatOverrides {
    /// Create an empty override bundle (all defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retrieval mode.
    pub fn with_retrieval_mode(mut self, mode: RetrievalMode) -> Self {
        self.retrieval_mode = Some(mode);
        self
    }

    /// Request follow-up question suggestions.
    pub fn with_followup_questions(mut self) -> Self {
        self.suggest_followup_questions = true;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the number of sources to retrieve.
    pub fn with_top(mut self, top: usize) -> Self {
        self.top = Some(top);
        self
    }
}
