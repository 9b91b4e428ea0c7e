//! Response post-processing.
//!
//! Turns the final completion call into the public response shape. The
//! non-streaming path splits follow-up markers out of the finished answer;
//! the streaming path is a single-pass forward-only state machine over the
//! incoming deltas that guarantees a partial follow-up marker never reaches
//! the caller as visible content.

use std::sync::Arc;

use futures::StreamExt;
use ragchat_core::{AppError, AppResult};
use ragchat_llm::{ChatMessage, MessageContent, Role};
use serde_json::Value;

use crate::approach::{ChatApproach, FinalCall};
use crate::followups::{extract_followup_questions, FOLLOWUP_OPEN_MARKER};
use crate::overrides::{AuthClaims, ChatOverrides};
use crate::response::{ChatEvent, ChatEventStream, ChatResponse};

/// Streaming answer state.
///
/// `Normal` emits delta content verbatim; once a follow-up marker appears
/// the stream switches to `Accumulating` and buffers everything for the
/// final extraction. Created per request, discarded at stream end.
enum StreamState {
    Normal,
    Accumulating(String),
}

/// Run one conversation turn without streaming.
pub async fn run_without_streaming(
    approach: &dyn ChatApproach,
    history: &[ChatMessage],
    overrides: &ChatOverrides,
    auth_claims: &AuthClaims,
    session_state: Option<Value>,
) -> AppResult<ChatResponse> {
    let FinalCall {
        mut context,
        request,
    } = approach
        .run_until_final_call(history, overrides, auth_claims, false)
        .await?;

    let completion = approach.chat_client().complete(&request).await?;
    let mut message = completion
        .first_message()
        .cloned()
        .ok_or_else(|| AppError::Llm("Completion response contained no choices".to_string()))?;

    if overrides.suggest_followup_questions {
        if let Some(content) = message.text_content() {
            let (visible, questions) = extract_followup_questions(content);
            message.content = Some(MessageContent::Text(visible));
            context.followup_questions = Some(questions);
        }
    }

    Ok(ChatResponse {
        message,
        context,
        session_state,
    })
}

/// Run one conversation turn, streaming the answer as it is generated.
///
/// Event ordering: one `Context` event (role marker, grounding context,
/// echoed session state) precedes all `Delta` events; if follow-up questions
/// were requested and the answer carried any, one `FollowupQuestions` event
/// follows all of them. Dropping the stream cancels the upstream completion.
pub fn run_with_streaming(
    approach: Arc<dyn ChatApproach>,
    history: Vec<ChatMessage>,
    overrides: ChatOverrides,
    auth_claims: AuthClaims,
    session_state: Option<Value>,
) -> ChatEventStream {
    Box::pin(async_stream::try_stream! {
        let FinalCall { context, request } = approach
            .run_until_final_call(&history, &overrides, &auth_claims, true)
            .await?;

        // Context goes out before the first token so the caller can render
        // citations immediately.
        yield ChatEvent::Context {
            role: Role::Assistant,
            context,
            session_state,
        };

        let mut upstream = approach.chat_client().stream(&request).await?;
        let mut state = StreamState::Normal;

        while let Some(chunk) = upstream.next().await {
            let chunk = chunk?;

            // Some upstream protocol versions emit an event without choices;
            // pass over it without treating it as content or end-of-stream.
            let Some(choice) = chunk.choices.first() else { continue };
            let Some(content) = choice.delta.content.as_deref() else { continue };

            match &mut state {
                StreamState::Normal => {
                    if overrides.suggest_followup_questions {
                        if let Some(marker) = content.find(FOLLOWUP_OPEN_MARKER) {
                            let earlier = content[..marker].to_string();
                            let rest = content[marker..].to_string();
                            if !earlier.is_empty() {
                                yield ChatEvent::Delta { content: earlier };
                            }
                            state = StreamState::Accumulating(rest);
                            continue;
                        }
                    }
                    yield ChatEvent::Delta { content: content.to_string() };
                }
                StreamState::Accumulating(buffer) => buffer.push_str(content),
            }
        }

        if let StreamState::Accumulating(buffer) = state {
            if !buffer.is_empty() {
                let (_, questions) = extract_followup_questions(&buffer);
                yield ChatEvent::FollowupQuestions { questions };
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ResponseContext;
    use ragchat_llm::providers::{content_chunks, text_completion, MockChatClient};
    use ragchat_llm::{ChatClient, ChatCompletionChunk, ChatRequest};

    /// Approach stub with a fixed final call, isolating the post-processor.
    struct FixedApproach {
        client: Arc<MockChatClient>,
    }

    impl FixedApproach {
        fn new(client: Arc<MockChatClient>) -> Self {
            Self { client }
        }
    }

    #[async_trait::async_trait]
    impl ChatApproach for FixedApproach {
        fn chat_client(&self) -> Arc<dyn ChatClient> {
            let client: Arc<dyn ChatClient> = self.client.clone();
            client
        }

        async fn run_until_final_call(
            &self,
            _history: &[ChatMessage],
            _overrides: &ChatOverrides,
            _auth_claims: &AuthClaims,
            should_stream: bool,
        ) -> AppResult<FinalCall> {
            Ok(FinalCall {
                context: ResponseContext::default(),
                request: ChatRequest::new("gpt-35-turbo", vec![ChatMessage::user("q")])
                    .with_streaming(should_stream),
            })
        }
    }

    async fn collect_events(mut stream: ChatEventStream) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event.unwrap());
        }
        events
    }

    fn followup_overrides() -> ChatOverrides {
        ChatOverrides::default().with_followup_questions()
    }

    #[tokio::test]
    async fn test_non_streaming_splits_followups() {
        let client = Arc::new(MockChatClient::new());
        client.enqueue_completion(text_completion("The answer. <<Q1?>><<Q2?>>"));
        let approach = FixedApproach::new(Arc::clone(&client));

        let response = run_without_streaming(
            &approach,
            &[ChatMessage::user("q")],
            &followup_overrides(),
            &AuthClaims::new(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(response.message.text_content(), Some("The answer. "));
        assert_eq!(
            response.context.followup_questions,
            Some(vec!["Q1?".to_string(), "Q2?".to_string()])
        );
    }

    #[tokio::test]
    async fn test_non_streaming_passthrough_without_followups() {
        let client = Arc::new(MockChatClient::new());
        client.enqueue_completion(text_completion("The answer. <<Q1?>>"));
        let approach = FixedApproach::new(Arc::clone(&client));

        let response = run_without_streaming(
            &approach,
            &[ChatMessage::user("q")],
            &ChatOverrides::default(),
            &AuthClaims::new(),
            None,
        )
        .await
        .unwrap();

        // Markers stay in the content when extraction was not requested.
        assert_eq!(response.message.text_content(), Some("The answer. <<Q1?>>"));
        assert!(response.context.followup_questions.is_none());
    }

    #[tokio::test]
    async fn test_non_streaming_echoes_session_state() {
        let client = Arc::new(MockChatClient::new());
        client.enqueue_completion(text_completion("answer"));
        let approach = FixedApproach::new(Arc::clone(&client));

        let state = serde_json::json!({"conversation_id": "abc"});
        let response = run_without_streaming(
            &approach,
            &[ChatMessage::user("q")],
            &ChatOverrides::default(),
            &AuthClaims::new(),
            Some(state.clone()),
        )
        .await
        .unwrap();

        assert_eq!(response.session_state, Some(state));
    }

    #[tokio::test]
    async fn test_streaming_scenario() {
        let client = Arc::new(MockChatClient::new());
        client.enqueue_chunks(content_chunks(&["Here", " is <<", "Q1?>>"]));
        let approach = Arc::new(FixedApproach::new(Arc::clone(&client)));

        let events = collect_events(run_with_streaming(
            approach,
            vec![ChatMessage::user("q")],
            followup_overrides(),
            AuthClaims::new(),
            None,
        ))
        .await;

        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], ChatEvent::Context { role: Role::Assistant, .. }));
        assert!(matches!(&events[1], ChatEvent::Delta { content } if content.as_str() == "Here"));
        assert!(matches!(&events[2], ChatEvent::Delta { content } if content.as_str() == " is "));
        assert!(
            matches!(&events[3], ChatEvent::FollowupQuestions { questions } if questions == &["Q1?".to_string()])
        );
    }

    #[tokio::test]
    async fn test_streaming_without_markers() {
        let client = Arc::new(MockChatClient::new());
        client.enqueue_chunks(content_chunks(&["Plain", " answer."]));
        let approach = Arc::new(FixedApproach::new(Arc::clone(&client)));

        let events = collect_events(run_with_streaming(
            approach,
            vec![ChatMessage::user("q")],
            followup_overrides(),
            AuthClaims::new(),
            None,
        ))
        .await;

        // No follow-up event when the answer carried no marker.
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ChatEvent::Context { .. }));
        assert!(matches!(&events[2], ChatEvent::Delta { content } if content.as_str() == " answer."));
    }

    #[tokio::test]
    async fn test_streaming_skips_choiceless_events() {
        let client = Arc::new(MockChatClient::new());
        let mut chunks = content_chunks(&["Hello"]);
        chunks.insert(0, ChatCompletionChunk { choices: vec![] });
        client.enqueue_chunks(chunks);
        let approach = Arc::new(FixedApproach::new(Arc::clone(&client)));

        let events = collect_events(run_with_streaming(
            approach,
            vec![ChatMessage::user("q")],
            ChatOverrides::default(),
            AuthClaims::new(),
            None,
        ))
        .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], ChatEvent::Delta { content } if content.as_str() == "Hello"));
    }

    #[tokio::test]
    async fn test_streaming_marker_suppressed_mid_stream() {
        // Content after the marker never surfaces as a delta, even when the
        // closing marker arrives several chunks later.
        let client = Arc::new(MockChatClient::new());
        client.enqueue_chunks(content_chunks(&[
            "Answer.",
            "<<What ",
            "about ",
            "X?>>",
        ]));
        let approach = Arc::new(FixedApproach::new(Arc::clone(&client)));

        let events = collect_events(run_with_streaming(
            approach,
            vec![ChatMessage::user("q")],
            followup_overrides(),
            AuthClaims::new(),
            None,
        ))
        .await;

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[1], ChatEvent::Delta { content } if content.as_str() == "Answer."));
        assert!(
            matches!(&events[2], ChatEvent::FollowupQuestions { questions } if questions == &["What about X?".to_string()])
        );
    }

    #[tokio::test]
    async fn test_streaming_matches_non_streaming_visible_content() {
        let full_response = "The grounded answer. <<Q1?>><<Q2?>>";

        // Non-streaming result
        let client = Arc::new(MockChatClient::new());
        client.enqueue_completion(text_completion(full_response));
        let approach = FixedApproach::new(Arc::clone(&client));
        let response = run_without_streaming(
            &approach,
            &[ChatMessage::user("q")],
            &followup_overrides(),
            &AuthClaims::new(),
            None,
        )
        .await
        .unwrap();

        // Streaming result over an arbitrary chunking of the same response
        let client = Arc::new(MockChatClient::new());
        client.enqueue_chunks(content_chunks(&[
            "The grounded",
            " answer. <<Q1",
            "?>><<Q2?>>",
        ]));
        let approach = Arc::new(FixedApproach::new(Arc::clone(&client)));
        let events = collect_events(run_with_streaming(
            approach,
            vec![ChatMessage::user("q")],
            followup_overrides(),
            AuthClaims::new(),
            None,
        ))
        .await;

        let streamed: String = events
            .iter()
            .filter_map(|event| match event {
                ChatEvent::Delta { content } => Some(content.as_str()),
                _ => None,
            })
            .collect();

        assert_eq!(Some(streamed.as_str()), response.message.text_content());

        let streamed_questions = events.iter().find_map(|event| match event {
            ChatEvent::FollowupQuestions { questions } => Some(questions.clone()),
            _ => None,
        });
        assert_eq!(streamed_questions, response.context.followup_questions);
    }
}
