//! Retrieval orchestration for the ragchat pipeline.
//!
//! The document index itself lives behind the `SearchBackend` trait; this
//! crate computes query embeddings, shapes the search call for the requested
//! retrieval mode (text, vectors, or hybrid), and renders results into the
//! citation-tagged source lines the answer prompt consumes.

pub mod filter;
pub mod images;
pub mod orchestrator;
pub mod search;
pub mod types;

// Re-export commonly used types
pub use filter::{build_filter, AuthClaims, NoSecurityFilter, SecurityFilterBuilder};
pub use images::{ImageStore, MockImageStore, NoImageStore};
pub use orchestrator::{render_sources, Retriever, TEXT_EMBEDDING_FIELD};
pub use search::{HttpSearchBackend, MockSearchBackend, SearchBackend};
pub use types::{Caption, RankingOptions, RetrievalMode, RetrievedSource, SearchOptions, VectorQuery};
