//! Answer-generation approaches.
//!
//! An approach runs the pipeline up to the final completion call: distill
//! the conversation into a search query, retrieve sources, assemble the
//! grounded answer prompt, and collect diagnostics. The text-only and
//! vision-augmented variants implement [`ChatApproach`] and are selected at
//! construction time.

use std::sync::Arc;

use handlebars::Handlebars;
use ragchat_core::{AppError, AppResult};
use ragchat_llm::{ChatClient, ChatMessage, ChatRequest};
use ragchat_retrieval::{
    build_filter, AuthClaims, RankingOptions, RetrievedSource, Retriever, SecurityFilterBuilder,
    TEXT_EMBEDDING_FIELD,
};
use serde_json::{json, Value};

use crate::distiller::{build_query_messages, build_query_request, extract_search_query};
use crate::overrides::ChatOverrides;
use crate::response::{ResponseContext, ThoughtStep};

/// Token allowance reserved for the model's answer; the assembler ceiling is
/// the model limit minus this.
pub const RESPONSE_TOKEN_LIMIT: u32 = 1024;

/// Prefix marking a prompt override as an addendum to the default template
/// rather than a full replacement.
pub const INJECTION_PREFIX: &str = ">>>";

/// Instructions appended to the system prompt when follow-up questions were
/// requested.
pub const FOLLOW_UP_QUESTIONS_PROMPT: &str = "\
Generate 3 very brief follow-up questions that the user would likely ask next.
Enclose the follow-up questions in double angle brackets. Example:
<<What is the deadline to notify the landlord about a repair?>>
<<How is severance pay calculated?>>
<<Which documents are required to start a labor claim?>>
Do not repeat questions that have already been asked.
Make sure the last question ends with \">>\".";

/// Diagnostics plus the prepared (not yet issued) answer request.
pub struct FinalCall {
    /// Grounding context and audit trail for the response
    pub context: ResponseContext,

    /// The answer completion request, ready to send
    pub request: ChatRequest,
}

/// One answer-generation strategy.
#[async_trait::async_trait]
pub trait ChatApproach: Send + Sync {
    /// Completion client used for the final answer call.
    fn chat_client(&self) -> Arc<dyn ChatClient>;

    /// Run the pipeline up to, but not including, the final completion
    /// call.
    async fn run_until_final_call(
        &self,
        history: &[ChatMessage],
        overrides: &ChatOverrides,
        auth_claims: &AuthClaims,
        should_stream: bool,
    ) -> AppResult<FinalCall>;
}

/// Render a system prompt template, resolving the override policy.
///
/// No override renders the default template. An override starting with
/// `>>>` is injected into the default template's `{{injected_prompt}}`
/// slot. Any other override replaces the template wholesale; its own
/// `{{follow_up_questions_prompt}}` slot is still honored.
pub fn render_system_prompt(
    default_template: &str,
    override_prompt: Option<&str>,
    follow_up_questions_prompt: &str,
) -> AppResult<String> {
    match override_prompt {
        None => render_template(default_template, "", follow_up_questions_prompt),
        Some(prompt) if prompt.starts_with(INJECTION_PREFIX) => {
            let injected = format!("{}\n", &prompt[INJECTION_PREFIX.len()..]);
            render_template(default_template, &injected, follow_up_questions_prompt)
        }
        Some(prompt) => render_template(prompt, "", follow_up_questions_prompt),
    }
}

/// Render a template with the two named slots.
fn render_template(
    template: &str,
    injected_prompt: &str,
    follow_up_questions_prompt: &str,
) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Prompts are plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("system", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render(
            "system",
            &json!({
                "injected_prompt": injected_prompt,
                "follow_up_questions_prompt": follow_up_questions_prompt,
            }),
        )
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

/// The shared distill-then-retrieve stage both approaches run first.
pub(crate) struct Grounder {
    pub chat_client: Arc<dyn ChatClient>,
    pub retriever: Retriever,
    pub security: Arc<dyn SecurityFilterBuilder>,
    pub model: String,
}

/// Everything the grounding stage produced, carried into prompt assembly
/// and the diagnostic thought steps.
pub(crate) struct Grounding {
    pub original_user_query: String,
    pub query_text: String,
    pub query_messages: Vec<ChatMessage>,
    pub sources: Vec<RetrievedSource>,
    pub vector_fields: Vec<String>,
    pub ranking: RankingOptions,
    pub filter: Option<String>,
}

impl Grounder {
    pub(crate) async fn ground(
        &self,
        history: &[ChatMessage],
        overrides: &ChatOverrides,
        auth_claims: &AuthClaims,
    ) -> AppResult<Grounding> {
        let original_user_query = history
            .last()
            .and_then(|message| message.text_content())
            .ok_or_else(|| {
                AppError::Other("Conversation history has no user question".to_string())
            })?
            .to_string();

        let mode = overrides.retrieval_mode.unwrap_or_default();
        let vector_fields = overrides
            .vector_fields
            .clone()
            .unwrap_or_else(|| vec![TEXT_EMBEDDING_FIELD.to_string()]);

        // Semantic features only apply when a text query reaches the backend.
        let has_text = mode.has_text();
        let ranking = RankingOptions {
            top: overrides.top.unwrap_or(3),
            use_semantic_ranker: overrides.semantic_ranker && has_text,
            use_semantic_captions: overrides.semantic_captions && has_text,
            min_score: overrides.minimum_search_score.unwrap_or(0.0),
            min_reranker_score: overrides.minimum_reranker_score.unwrap_or(0.0),
        };

        let filter = build_filter(
            overrides.exclude_category.as_deref(),
            self.security.build_security_filter(auth_claims),
        );

        // STEP 1: rewrite the conversation into a standalone search query
        let query_messages = build_query_messages(&self.model, history, &original_user_query)?;
        let completion = self
            .chat_client
            .complete(&build_query_request(&self.model, query_messages.clone()))
            .await?;
        let query_text = extract_search_query(&completion, &original_user_query)?;

        tracing::info!("Distilled search query: {}", query_text);

        // STEP 2: retrieve sources with the distilled query
        let sources = self
            .retriever
            .retrieve(&query_text, mode, &vector_fields, filter.clone(), &ranking)
            .await?;

        tracing::info!("Retrieved {} sources", sources.len());

        Ok(Grounding {
            original_user_query,
            query_text,
            query_messages,
            sources,
            vector_fields,
            ranking,
            filter,
        })
    }
}

/// Build the four-step audit trail shared by both approaches.
pub(crate) fn pipeline_thoughts(
    grounding: &Grounding,
    answer_messages: &[ChatMessage],
    model: &str,
) -> Vec<ThoughtStep> {
    vec![
        ThoughtStep::new(
            "Prompt to generate search query",
            serde_json::to_value(&grounding.query_messages).unwrap_or(Value::Null),
            Some(json!({ "model": model })),
        ),
        ThoughtStep::new(
            "Search using generated search query",
            Value::String(grounding.query_text.clone()),
            Some(json!({
                "use_semantic_captions": grounding.ranking.use_semantic_captions,
                "use_semantic_ranker": grounding.ranking.use_semantic_ranker,
                "top": grounding.ranking.top,
                "filter": grounding.filter,
                "vector_fields": grounding.vector_fields,
            })),
        ),
        ThoughtStep::new(
            "Search results",
            serde_json::to_value(&grounding.sources).unwrap_or(Value::Null),
            None,
        ),
        ThoughtStep::new(
            "Prompt to generate answer",
            serde_json::to_value(answer_messages).unwrap_or(Value::Null),
            Some(json!({ "model": model })),
        ),
    ]
}

/// Assemble the diagnostics record from data points and thoughts.
pub(crate) fn response_context(
    text_sources: Vec<String>,
    images: Vec<String>,
    thoughts: Vec<ThoughtStep>,
) -> ResponseContext {
    ResponseContext {
        data_points: crate::response::DataPoints {
            text: text_sources,
            images,
        },
        thoughts,
        followup_questions: None,
    }
}
