//! Retrieval data model.
//!
//! Defines the retrieved-passage shape returned by the search backend and
//! the parameter bundles the orchestrator forwards to it.

use serde::{Deserialize, Serialize};

/// A passage returned by the search backend.
///
/// Immutable once returned; rendering into prompt lines never mutates the
/// source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedSource {
    /// Index document key
    pub id: String,

    /// Passage text
    pub content: String,

    /// Source page name used for citations (e.g., "contract1-3.png")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_page: Option<String>,

    /// Semantic caption fragments, when the backend produced them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captions: Option<Vec<Caption>>,

    /// Search relevance score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Semantic reranker score, when reranking ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reranker_score: Option<f64>,
}

/// One semantic caption fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caption {
    /// Caption text
    pub text: String,
}

/// How the search backend should be queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Lexical search only
    Text,
    /// Vector search only
    Vectors,
    /// Lexical and vector search combined
    #[default]
    Hybrid,
}

impl RetrievalMode {
    /// Whether a text query should be sent to the backend.
    pub fn has_text(&self) -> bool {
        matches!(self, RetrievalMode::Text | RetrievalMode::Hybrid)
    }

    /// Whether query embeddings should be computed and sent.
    pub fn has_vectors(&self) -> bool {
        matches!(self, RetrievalMode::Vectors | RetrievalMode::Hybrid)
    }

    /// Parse a retrieval mode from its wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(RetrievalMode::Text),
            "vectors" => Some(RetrievalMode::Vectors),
            "hybrid" => Some(RetrievalMode::Hybrid),
            _ => None,
        }
    }
}

/// One query embedding targeted at a vector field of the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorQuery {
    /// Query embedding
    pub vector: Vec<f32>,

    /// Vector field the embedding searches against
    pub fields: String,
}

/// Ranking parameters forwarded opaquely to the search backend.
///
/// Score thresholds, semantic reranking and captions are entirely the
/// backend's concern; the orchestrator only carries them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingOptions {
    /// Number of results to return
    pub top: usize,

    /// Enable the backend's semantic reranker
    pub use_semantic_ranker: bool,

    /// Return semantic caption fragments instead of full content
    pub use_semantic_captions: bool,

    /// Minimum search score
    pub min_score: f64,

    /// Minimum reranker score
    pub min_reranker_score: f64,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            top: 3,
            use_semantic_ranker: false,
            use_semantic_captions: false,
            min_score: 0.0,
            min_reranker_score: 0.0,
        }
    }
}

/// The full parameter bundle of one search call.
///
/// `query_text` is `None`, not merely empty, when no lexical search was
/// requested; the backend distinguishes the two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Number of results to return
    pub top: usize,

    /// Lexical query, absent for pure vector retrieval
    pub query_text: Option<String>,

    /// Opaque filter expression
    pub filter: Option<String>,

    /// Query embeddings, one per requested vector field
    pub vectors: Vec<VectorQuery>,

    /// Enable the backend's semantic reranker
    pub use_semantic_ranker: bool,

    /// Return semantic caption fragments
    pub use_semantic_captions: bool,

    /// Minimum search score
    pub min_score: f64,

    /// Minimum reranker score
    pub min_reranker_score: f64,
}
