//! Vision-augmented answer generation.
//!
//! Grounds the answer on a multimodal user turn: the literal question, a
//! text block of rendered sources, and the page-render images resolved for
//! the retrieved sources. Which modalities are included is controlled by the
//! `vision_input` override.

use std::sync::Arc;

use ragchat_core::AppResult;
use ragchat_llm::tokens::model_token_limit;
use ragchat_llm::{ChatClient, ChatMessage, ChatRequest, ContentPart, ImageUrl, MessageContent};
use ragchat_retrieval::{
    render_sources, AuthClaims, ImageStore, Retriever, SecurityFilterBuilder,
};

use crate::approach::{
    pipeline_thoughts, render_system_prompt, response_context, ChatApproach, FinalCall, Grounder,
    FOLLOW_UP_QUESTIONS_PROMPT, RESPONSE_TOKEN_LIMIT,
};
use crate::assembler::build_messages;
use crate::overrides::{ChatOverrides, VisionInput};

const DEFAULT_TEMPERATURE: f32 = 0.0;

const SYSTEM_MESSAGE_TEMPLATE: &str = "\
You are an intelligent assistant helping users with questions about documents that contain text, graphs, tables and images.
Always include the source name of the image or text for each fact you use in the response in the format: [filename].
Answer the following question using only the data provided in the sources below.
If asking a clarifying question to the user would help, ask the question.
Be brief in your answers.
For tabular information return it as an html table. Do not return markdown format.
The text and image source can be the same file name; do not use the image title when citing the image source, only the file name as mentioned.
If you cannot answer using the sources below, say you don't know. Return just the answer without any input text.
{{follow_up_questions_prompt}}
{{injected_prompt}}";

/// Vision-augmented answer generator.
pub struct VisionChatApproach {
    grounder: Grounder,
    image_store: Arc<dyn ImageStore>,
}

impl VisionChatApproach {
    /// Create a vision approach over the given collaborators.
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        retriever: Retriever,
        security: Arc<dyn SecurityFilterBuilder>,
        image_store: Arc<dyn ImageStore>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            grounder: Grounder {
                chat_client,
                retriever,
                security,
                model: model.into(),
            },
            image_store,
        }
    }
}

#[async_trait::async_trait]
impl ChatApproach for VisionChatApproach {
    fn chat_client(&self) -> Arc<dyn ChatClient> {
        Arc::clone(&self.grounder.chat_client)
    }

    async fn run_until_final_call(
        &self,
        history: &[ChatMessage],
        overrides: &ChatOverrides,
        auth_claims: &AuthClaims,
        should_stream: bool,
    ) -> AppResult<FinalCall> {
        let model = self.grounder.model.clone();
        let grounding = self.grounder.ground(history, overrides, auth_claims).await?;

        let sources_content =
            render_sources(&grounding.sources, grounding.ranking.use_semantic_captions, true);

        // STEP 3: generate the multimodal answer prompt
        let system_message = render_system_prompt(
            SYSTEM_MESSAGE_TEMPLATE,
            overrides.prompt_template.as_deref(),
            if overrides.suggest_followup_questions {
                FOLLOW_UP_QUESTIONS_PROMPT
            } else {
                ""
            },
        )?;

        let vision_input = overrides.vision_input.unwrap_or(VisionInput::TextAndImages);

        let mut user_content = vec![ContentPart::Text {
            text: grounding.original_user_query.clone(),
        }];

        if vision_input.include_texts() {
            user_content.push(ContentPart::Text {
                text: format!("\n\nSources:\n{}", sources_content.join("\n")),
            });
        }

        let mut image_list = Vec::new();
        if vision_input.include_images() {
            for source in &grounding.sources {
                // A source without a resolvable image is simply skipped.
                if let Some(url) = self.image_store.fetch_image(source).await? {
                    user_content.push(ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: url.clone(),
                            detail: None,
                        },
                    });
                    image_list.push(url);
                }
            }
        }

        let messages_token_limit =
            model_token_limit(&model)?.saturating_sub(RESPONSE_TOKEN_LIMIT);

        let messages = build_messages(
            &model,
            &system_message,
            &[],
            history,
            MessageContent::Parts(user_content),
            messages_token_limit,
        )?;

        let thoughts = pipeline_thoughts(&grounding, &messages, &model);
        let context = response_context(sources_content, image_list, thoughts);

        let request = ChatRequest::new(&model, messages)
            .with_temperature(overrides.temperature.unwrap_or(DEFAULT_TEMPERATURE))
            .with_max_tokens(RESPONSE_TOKEN_LIMIT)
            .with_n(1)
            .with_streaming(should_stream);

        Ok(FinalCall { context, request })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragchat_llm::providers::{text_completion, MockChatClient, MockEmbeddingsClient};
    use ragchat_retrieval::{
        MockImageStore, MockSearchBackend, NoSecurityFilter, RetrievedSource,
    };

    fn source(id: &str, page: &str, content: &str) -> RetrievedSource {
        RetrievedSource {
            id: id.to_string(),
            content: content.to_string(),
            source_page: Some(page.to_string()),
            captions: None,
            score: Some(0.5),
            reranker_score: None,
        }
    }

    fn approach(
        chat: Arc<MockChatClient>,
        results: Vec<RetrievedSource>,
        images: MockImageStore,
    ) -> VisionChatApproach {
        let retriever = Retriever::new(
            Arc::new(MockSearchBackend::new(results)),
            Arc::new(MockEmbeddingsClient::new(64)),
        );
        VisionChatApproach::new(
            chat,
            retriever,
            Arc::new(NoSecurityFilter),
            Arc::new(images),
            "gpt-4",
        )
    }

    fn image_parts(message: &ChatMessage) -> usize {
        match &message.content {
            Some(MessageContent::Parts(parts)) => parts
                .iter()
                .filter(|part| matches!(part, ContentPart::ImageUrl { .. }))
                .count(),
            _ => 0,
        }
    }

    #[tokio::test]
    async fn test_multimodal_user_turn() {
        let chat = Arc::new(MockChatClient::new());
        chat.enqueue_completion(text_completion("chart query"));

        let images = MockImageStore::new()
            .insert("1", "https://img.example.test/page1.png")
            .insert("2", "https://img.example.test/page2.png");

        let approach = approach(
            Arc::clone(&chat),
            vec![
                source("1", "report-1.png", "Revenue chart for Q1."),
                source("2", "report-2.png", "Revenue chart for Q2."),
            ],
            images,
        );

        let history = vec![ChatMessage::user("What does the revenue chart show?")];
        let final_call = approach
            .run_until_final_call(&history, &ChatOverrides::default(), &AuthClaims::new(), false)
            .await
            .unwrap();

        // Vision variant defaults to temperature 0.0.
        assert_eq!(final_call.request.temperature, Some(0.0));

        let last = final_call.request.messages.last().unwrap();
        assert_eq!(image_parts(last), 2);

        // Image citation mode keeps the page-render name as the citation.
        assert_eq!(
            final_call.context.data_points.text,
            vec![
                "report-1.png: Revenue chart for Q1.",
                "report-2.png: Revenue chart for Q2."
            ]
        );
        assert_eq!(final_call.context.data_points.images.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_image_is_skipped() {
        let chat = Arc::new(MockChatClient::new());
        chat.enqueue_completion(text_completion("chart query"));

        // Only the first source has a resolvable image.
        let images = MockImageStore::new().insert("1", "https://img.example.test/page1.png");

        let approach = approach(
            Arc::clone(&chat),
            vec![
                source("1", "report-1.png", "Revenue chart for Q1."),
                source("2", "report-2.png", "Revenue chart for Q2."),
            ],
            images,
        );

        let history = vec![ChatMessage::user("What does the revenue chart show?")];
        let final_call = approach
            .run_until_final_call(&history, &ChatOverrides::default(), &AuthClaims::new(), false)
            .await
            .unwrap();

        let last = final_call.request.messages.last().unwrap();
        assert_eq!(image_parts(last), 1);
        assert_eq!(
            final_call.context.data_points.images,
            vec!["https://img.example.test/page1.png"]
        );
    }

    #[tokio::test]
    async fn test_texts_only_input_excludes_images() {
        let chat = Arc::new(MockChatClient::new());
        chat.enqueue_completion(text_completion("chart query"));

        let images = MockImageStore::new().insert("1", "https://img.example.test/page1.png");
        let approach = approach(
            Arc::clone(&chat),
            vec![source("1", "report-1.png", "Revenue chart for Q1.")],
            images,
        );

        let mut overrides = ChatOverrides::default();
        overrides.vision_input = Some(VisionInput::Texts);

        let history = vec![ChatMessage::user("What does the revenue chart show?")];
        let final_call = approach
            .run_until_final_call(&history, &overrides, &AuthClaims::new(), false)
            .await
            .unwrap();

        let last = final_call.request.messages.last().unwrap();
        assert_eq!(image_parts(last), 0);
        assert!(final_call.context.data_points.images.is_empty());
        assert!(last.text_content().is_some());
    }
}
