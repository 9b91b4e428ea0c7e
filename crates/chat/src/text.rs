//! Text-only answer generation.
//!
//! Grounds the answer on rendered text sources inlined into a single user
//! turn, with one canned question/answer pair ahead of it to prime the
//! citation style.

use std::sync::Arc;

use ragchat_core::AppResult;
use ragchat_llm::tokens::model_token_limit;
use ragchat_llm::{ChatClient, ChatMessage, ChatRequest, MessageContent};
use ragchat_retrieval::{render_sources, AuthClaims, Retriever, SecurityFilterBuilder};

use crate::approach::{
    pipeline_thoughts, render_system_prompt, response_context, ChatApproach, FinalCall, Grounder,
    FOLLOW_UP_QUESTIONS_PROMPT, RESPONSE_TOKEN_LIMIT,
};
use crate::assembler::build_messages;
use crate::overrides::ChatOverrides;

const DEFAULT_TEMPERATURE: f32 = 0.3;

const SYSTEM_MESSAGE_TEMPLATE: &str = "\
You are an intelligent assistant helping employees with questions about a set of legal contracts.
Use 'you' to refer to the individual asking the questions even if they ask with 'I'.
Answer the following question using only the data provided in the sources below.
Each source has a name followed by a colon and the actual information; always include the source name for each fact you use in the response.
For tabular information return it as an html table. Do not return markdown format.
If you cannot answer using the sources below, say you don't know.
{{follow_up_questions_prompt}}
{{injected_prompt}}";

// Style-priming exchange shown to the model before the real question.
const EXAMPLE_QUESTION: &str = "\
'What is the mean value of these contracts?'

Sources:
contract1.pdf: This contract, effective from 30/11/2023 to 30/11/2024, covers the receipt, storage, and final disposal of unusable tires. The contract value is $154,800.00.
contract2.pdf: This contract covers the acquisition of items at a total cost of $469,899.99, paid from specific budgetary allocations.
contract3.pdf: This contract, which does not allow subcontracting, covers the provision of services at a total cost of $663,500.00 including all direct and indirect expenses.
contract4.pdf: This contract covers specialized expert-report services. The total value is $1,200.00, payable within 30 days of invoicing.";

const EXAMPLE_ANSWER: &str = "\
The mean value of the contracts is $322,349.99 [contract1.pdf][contract2.pdf][contract3.pdf][contract4.pdf]. This is calculated by adding the total values ($154,800.00, $469,899.99, $663,500.00, $1,200.00) and dividing by the number of contracts (4).";

/// Text-only answer generator.
pub struct TextChatApproach {
    grounder: Grounder,
}

impl TextChatApproach {
    /// Create a text approach over the given collaborators.
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        retriever: Retriever,
        security: Arc<dyn SecurityFilterBuilder>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            grounder: Grounder {
                chat_client,
                retriever,
                security,
                model: model.into(),
            },
        }
    }
}

#[async_trait::async_trait]
impl ChatApproach for TextChatApproach {
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
            render_sources(&grounding.sources, grounding.ranking.use_semantic_captions, false);

        // STEP 3: generate the answer prompt from sources and history
        let system_message = render_system_prompt(
            SYSTEM_MESSAGE_TEMPLATE,
            overrides.prompt_template.as_deref(),
            if overrides.suggest_followup_questions {
                FOLLOW_UP_QUESTIONS_PROMPT
            } else {
                ""
            },
        )?;

        let user_content = format!(
            "{}\n\nSources:\n{}",
            grounding.original_user_query,
            sources_content.join("\n")
        );

        let few_shots = vec![
            ChatMessage::user(EXAMPLE_QUESTION),
            ChatMessage::assistant(EXAMPLE_ANSWER),
        ];

        let messages_token_limit =
            model_token_limit(&model)?.saturating_sub(RESPONSE_TOKEN_LIMIT);

        let messages = build_messages(
            &model,
            &system_message,
            &few_shots,
            history,
            MessageContent::Text(user_content),
            messages_token_limit,
        )?;

        let thoughts = pipeline_thoughts(&grounding, &messages, &model);
        let context = response_context(sources_content, Vec::new(), thoughts);

        let request = ChatRequest::new(&model, messages)
            .with_temperature(overrides.temperature.unwrap_or(DEFAULT_TEMPERATURE))
            .with_max_tokens(RESPONSE_TOKEN_LIMIT)
            .with_n(1)
            .with_streaming(should_stream);

        Ok(FinalCall { context, request })
    }
}
