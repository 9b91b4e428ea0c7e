//! Retrieval orchestration.
//!
//! Computes query embeddings for the requested vector fields, shapes the
//! search call for the retrieval mode, and renders results into the
//! citation-tagged lines the answer prompt consumes.

use std::sync::Arc;

use ragchat_core::AppResult;
use ragchat_llm::EmbeddingsClient;

use crate::search::SearchBackend;
use crate::types::{RankingOptions, RetrievalMode, RetrievedSource, SearchOptions, VectorQuery};

/// Vector field name designating ordinary text embeddings. Any other field
/// name is treated as an image-modality vector field.
pub const TEXT_EMBEDDING_FIELD: &str = "embedding";

/// Retrieval orchestrator.
///
/// Owns the search backend and embeddings collaborators; one instance serves
/// any number of concurrent requests (no per-request state lives here).
pub struct Retriever {
    search: Arc<dyn SearchBackend>,
    embeddings: Arc<dyn EmbeddingsClient>,
}

impl Retriever {
    /// Create a new orchestrator over the given collaborators.
    pub fn new(search: Arc<dyn SearchBackend>, embeddings: Arc<dyn EmbeddingsClient>) -> Self {
        Self { search, embeddings }
    }

    /// Execute one retrieval: embed (if the mode calls for it), search,
    /// return ranked sources.
    ///
    /// Embeddings for multiple vector fields are computed concurrently; all
    /// must complete before the search call. When the mode excludes lexical
    /// search the query text sent downstream is `None`, never an empty
    /// string; the backend distinguishes "no text search" from "empty
    /// query".
    pub async fn retrieve(
        &self,
        query_text: &str,
        mode: RetrievalMode,
        vector_fields: &[String],
        filter: Option<String>,
        ranking: &RankingOptions,
    ) -> AppResult<Vec<RetrievedSource>> {
        let vectors = if mode.has_vectors() {
            let pending = vector_fields.iter().map(|field| async move {
                let vector = if field == TEXT_EMBEDDING_FIELD {
                    self.embeddings.embed_text(query_text).await?
                } else {
                    self.embeddings.embed_image_query(query_text).await?
                };
                Ok::<_, ragchat_core::AppError>(VectorQuery {
                    vector,
                    fields: field.clone(),
                })
            });
            futures::future::try_join_all(pending).await?
        } else {
            Vec::new()
        };

        let query_text = mode.has_text().then(|| query_text.to_string());

        tracing::info!(
            "Retrieving sources (mode: {:?}, top: {}, vectors: {}, text: {})",
            mode,
            ranking.top,
            vectors.len(),
            query_text.is_some()
        );

        let options = SearchOptions {
            top: ranking.top,
            query_text,
            filter,
            vectors,
            use_semantic_ranker: ranking.use_semantic_ranker,
            use_semantic_captions: ranking.use_semantic_captions,
            min_score: ranking.min_score,
            min_reranker_score: ranking.min_reranker_score,
        };

        self.search.search(&options).await
    }
}

/// Render sources into one citation-tagged line each: `"<citation>: <text>"`.
///
/// With semantic captions enabled, the caption fragments replace the full
/// passage text.
pub fn render_sources(
    results: &[RetrievedSource],
    use_semantic_captions: bool,
    use_image_citation: bool,
) -> Vec<String> {
    results
        .iter()
        .map(|source| {
            let page = source.source_page.as_deref().unwrap_or("");
            let body = if use_semantic_captions {
                source
                    .captions
                    .as_deref()
                    .unwrap_or(&[])
                    .iter()
                    .map(|c| c.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" . ")
            } else {
                source.content.clone()
            };
            format!("{}: {}", citation(page, use_image_citation), flatten_text(&body))
        })
        .collect()
}

/// Turn a source page name into a citation tag.
///
/// Page renders named `<doc>-<n>.png` cite the originating document page
/// (`<doc>.pdf#page=<n>`) unless image citations are in effect, in which
/// case the render itself is the citation.
pub fn citation(source_page: &str, use_image_citation: bool) -> String {
    if use_image_citation {
        return source_page.to_string();
    }

    if let Some(path) = source_page
        .strip_suffix(".png")
        .or_else(|| source_page.strip_suffix(".PNG"))
    {
        if let Some(idx) = path.rfind('-') {
            if let Ok(page_number) = path[idx + 1..].parse::<u32>() {
                return format!("{}.pdf#page={}", &path[..idx], page_number);
            }
        }
    }

    source_page.to_string()
}

/// Collapse newlines and neutralize square brackets so rendered lines can't
/// be confused with citation tags downstream.
fn flatten_text(s: &str) -> String {
    s.replace(['\n', '\r'], " ")
        .replace('[', "【")
        .replace(']', "】")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::MockSearchBackend;
    use crate::types::Caption;
    use ragchat_llm::providers::MockEmbeddingsClient;

    fn source(id: &str, content: &str, page: Option<&str>) -> RetrievedSource {
        RetrievedSource {
            id: id.to_string(),
            content: content.to_string(),
            source_page: page.map(|p| p.to_string()),
            captions: None,
            score: Some(0.5),
            reranker_score: None,
        }
    }

    fn retriever(backend: Arc<MockSearchBackend>) -> Retriever {
        Retriever::new(backend, Arc::new(MockEmbeddingsClient::new(64)))
    }

    #[tokio::test]
    async fn test_text_mode_sends_query_and_no_vectors() {
        let backend = Arc::new(MockSearchBackend::new(Vec::new()));
        let retriever = retriever(Arc::clone(&backend));

        retriever
            .retrieve(
                "lease term",
                RetrievalMode::Text,
                &["embedding".to_string()],
                None,
                &RankingOptions::default(),
            )
            .await
            .unwrap();

        let request = &backend.requests()[0];
        assert_eq!(request.query_text.as_deref(), Some("lease term"));
        assert!(request.vectors.is_empty());
    }

    #[tokio::test]
    async fn test_vectors_mode_nulls_query_text() {
        let backend = Arc::new(MockSearchBackend::new(Vec::new()));
        let retriever = retriever(Arc::clone(&backend));

        retriever
            .retrieve(
                "lease term",
                RetrievalMode::Vectors,
                &["embedding".to_string()],
                None,
                &RankingOptions::default(),
            )
            .await
            .unwrap();

        let request = &backend.requests()[0];
        assert!(request.query_text.is_none());
        assert_eq!(request.vectors.len(), 1);
        assert_eq!(request.vectors[0].fields, "embedding");
    }

    #[tokio::test]
    async fn test_hybrid_mode_sends_both() {
        let backend = Arc::new(MockSearchBackend::new(Vec::new()));
        let retriever = retriever(Arc::clone(&backend));

        retriever
            .retrieve(
                "lease term",
                RetrievalMode::Hybrid,
                &["embedding".to_string()],
                Some("category ne 'internal'".to_string()),
                &RankingOptions::default(),
            )
            .await
            .unwrap();

        let request = &backend.requests()[0];
        assert_eq!(request.query_text.as_deref(), Some("lease term"));
        assert_eq!(request.vectors.len(), 1);
        assert_eq!(request.filter.as_deref(), Some("category ne 'internal'"));
    }

    #[tokio::test]
    async fn test_image_field_uses_image_modality() {
        let backend = Arc::new(MockSearchBackend::new(Vec::new()));
        let retriever = retriever(Arc::clone(&backend));

        retriever
            .retrieve(
                "lease term",
                RetrievalMode::Vectors,
                &["embedding".to_string(), "imageEmbedding".to_string()],
                None,
                &RankingOptions::default(),
            )
            .await
            .unwrap();

        let request = &backend.requests()[0];
        assert_eq!(request.vectors.len(), 2);
        assert_eq!(request.vectors[0].fields, "embedding");
        assert_eq!(request.vectors[1].fields, "imageEmbedding");
        // Different modalities must not produce identical vectors
        assert_ne!(request.vectors[0].vector, request.vectors[1].vector);
    }

    #[test]
    fn test_render_sources_plain() {
        let sources = vec![source("1", "First passage", Some("contract1.pdf"))];
        let lines = render_sources(&sources, false, false);
        assert_eq!(lines, vec!["contract1.pdf: First passage"]);
    }

    #[test]
    fn test_render_sources_flattens_text() {
        let sources = vec![source(
            "1",
            "line one\nline two [note]",
            Some("contract1.pdf"),
        )];
        let lines = render_sources(&sources, false, false);
        assert_eq!(lines, vec!["contract1.pdf: line one line two 【note】"]);
    }

    #[test]
    fn test_render_sources_with_captions() {
        let mut src = source("1", "Full passage text", Some("contract1.pdf"));
        src.captions = Some(vec![
            Caption {
                text: "first fragment".to_string(),
            },
            Caption {
                text: "second fragment".to_string(),
            },
        ]);

        let lines = render_sources(&[src], true, false);
        assert_eq!(lines, vec!["contract1.pdf: first fragment . second fragment"]);
    }

    #[test]
    fn test_citation_page_render() {
        assert_eq!(citation("contract1-3.png", false), "contract1.pdf#page=3");
        assert_eq!(citation("contract1-3.png", true), "contract1-3.png");
    }

    #[test]
    fn test_citation_non_page_names_pass_through() {
        assert_eq!(citation("contract1.pdf", false), "contract1.pdf");
        assert_eq!(citation("diagram.png", false), "diagram.png");
        assert_eq!(citation("", false), "");
    }
}
