//! Search query distillation.
//!
//! The first completion call of the pipeline: rewrite the conversation so
//! far into a standalone search query. The model may answer with plain text
//! or by calling the `search_sources` tool; either way the sentinel `"0"`
//! means it could not produce a query and the raw user question is used
//! instead.

use ragchat_core::{AppError, AppResult};
use ragchat_llm::tokens::model_token_limit;
use ragchat_llm::{ChatCompletion, ChatMessage, ChatRequest, MessageContent, Tool};
use serde::Deserialize;

use crate::assembler::build_messages;

/// Sentinel the model returns when it cannot generate a search query.
pub const NO_RESPONSE: &str = "0";

/// Token cap for the distillation completion.
const QUERY_MAX_TOKENS: u32 = 100;

/// Instruction template for query distillation.
const QUERY_PROMPT_TEMPLATE: &str = "\
Below is a history of the conversation so far, and a new question asked by the user that needs to be answered by searching in a knowledge base.
You have access to a search index with hundreds of documents.
Generate a search query based on the conversation and the new question.
Do not include cited filenames or document names such as info.txt or doc.pdf in the search query terms.
Do not include any text inside [] or <<>> in the search query terms.
Do not include any special characters like '+'.
If you cannot generate a search query, return just the number 0.";

/// Few-shot pairs priming the question-to-query rewrite.
///
/// These demonstrate the transformation pattern; they are not
/// behavior-critical beyond that.
pub fn query_prompt_few_shots() -> Vec<ChatMessage> {
    vec![
        ChatMessage::user("What was the reason for the appeal in the rental lease case?"),
        ChatMessage::assistant("Identify the reason for the appeal in the rental lease case"),
        ChatMessage::user("What arguments did the appellant present in the labor case?"),
        ChatMessage::assistant("List the arguments presented by the appellant in the labor case"),
        ChatMessage::user("What did the first-instance judge decide in the rental lease case?"),
        ChatMessage::assistant("Describe the first-instance ruling in the rental lease case"),
        ChatMessage::user("What evidence was presented in the labor case?"),
        ChatMessage::assistant("Identify the evidence presented in the labor case"),
        ChatMessage::user("What was the outcome of the appeal in the rental lease case?"),
        ChatMessage::assistant("Report the outcome of the appeal in the rental lease case"),
        ChatMessage::user("What is the procedure to file an eviction action for non-payment?"),
        ChatMessage::assistant("Explain the procedure to file an eviction action for non-payment"),
        ChatMessage::user("What are the requirements for constructive dismissal?"),
        ChatMessage::assistant("Describe the requirements for constructive dismissal"),
        ChatMessage::user("What are the deadlines to appeal a court ruling?"),
        ChatMessage::assistant("Report the deadlines to appeal a court ruling"),
        ChatMessage::user("How are damages for emotional distress calculated in a labor case?"),
        ChatMessage::assistant(
            "Explain how damages for emotional distress are calculated in a labor case",
        ),
        ChatMessage::user("Which documents are required to file a claim for overdue rent?"),
        ChatMessage::assistant("List the documents required to file a claim for overdue rent"),
        ChatMessage::user("What is the difference between a residential and a commercial lease?"),
        ChatMessage::assistant(
            "Explain the difference between a residential and a commercial lease",
        ),
        ChatMessage::user("What forms of guarantee can secure a lease agreement?"),
        ChatMessage::assistant("Identify the forms of guarantee that can secure a lease agreement"),
    ]
}

/// Tool definition the model can call to hand back the search query.
pub fn search_sources_tool() -> Tool {
    Tool::function(
        "search_sources",
        "Retrieve sources from the search index",
        serde_json::json!({
            "type": "object",
            "properties": {
                "search_query": {
                    "type": "string",
                    "description": "Query string to retrieve documents from the search index"
                }
            },
            "required": ["search_query"]
        }),
    )
}

/// Build the distillation prompt for the given conversation.
///
/// The ceiling subtracts the character length of the rewritten request from
/// the model limit, a deliberate stand-in for a token count; replacing it
/// with a real count would shift which history turns survive truncation.
pub fn build_query_messages(
    model: &str,
    history: &[ChatMessage],
    original_user_query: &str,
) -> AppResult<Vec<ChatMessage>> {
    let user_query_request = format!("Generate search query for: {}", original_user_query);

    let max_tokens =
        model_token_limit(model)?.saturating_sub(user_query_request.chars().count() as u32);

    build_messages(
        model,
        QUERY_PROMPT_TEMPLATE,
        &query_prompt_few_shots(),
        history,
        MessageContent::Text(user_query_request),
        max_tokens,
    )
}

/// Build the completion request for the distillation call.
///
/// Low temperature for a deterministic rewrite, a tight token cap, and the
/// `search_sources` tool on offer.
pub fn build_query_request(model: &str, messages: Vec<ChatMessage>) -> ChatRequest {
    ChatRequest::new(model, messages)
        .with_temperature(0.0)
        .with_max_tokens(QUERY_MAX_TOKENS)
        .with_n(1)
        .with_tools(vec![search_sources_tool()])
}

#[derive(Debug, Deserialize)]
struct SearchSourcesArgs {
    #[serde(default)]
    search_query: Option<String>,
}

/// Extract the search query from the distillation completion.
///
/// Preference order: a `search_sources` tool call whose payload carries a
/// non-sentinel `search_query`, then plain text unless it trims to the
/// sentinel, then the raw user question. Unparseable tool-call payloads are
/// an error, not a fallback.
pub fn extract_search_query(
    completion: &ChatCompletion,
    original_user_query: &str,
) -> AppResult<String> {
    if let Some(message) = completion.first_message() {
        if let Some(tool_calls) = &message.tool_calls {
            for call in tool_calls {
                if call.call_type != "function" || call.function.name != "search_sources" {
                    continue;
                }

                let args: SearchSourcesArgs = serde_json::from_str(&call.function.arguments)
                    .map_err(|e| {
                        AppError::MalformedFunctionArguments(format!(
                            "{}: {}",
                            call.function.name, e
                        ))
                    })?;

                if let Some(query) = args.search_query {
                    if query != NO_RESPONSE {
                        return Ok(query);
                    }
                }
            }
        } else if let Some(text) = message.text_content() {
            if text.trim() != NO_RESPONSE {
                return Ok(text.to_string());
            }
        }
    }

    Ok(original_user_query.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragchat_llm::{ChatChoice, FunctionCall, Role, ToolCall};

    fn tool_completion(arguments: &str) -> ChatCompletion {
        ChatCompletion {
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage::assistant_with_tool_calls(vec![ToolCall {
                    id: "call_1".to_string(),
                    call_type: "function".to_string(),
                    function: FunctionCall {
                        name: "search_sources".to_string(),
                        arguments: arguments.to_string(),
                    },
                }]),
                finish_reason: Some("tool_calls".to_string()),
            }],
        }
    }

    fn text_completion(content: &str) -> ChatCompletion {
        ChatCompletion {
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage::assistant(content),
                finish_reason: Some("stop".to_string()),
            }],
        }
    }

    #[test]
    fn test_extract_from_tool_call() {
        let completion = tool_completion(r#"{"search_query": "lease termination deadline"}"#);
        let query = extract_search_query(&completion, "raw question").unwrap();
        assert_eq!(query, "lease termination deadline");
    }

    #[test]
    fn test_tool_call_sentinel_falls_back() {
        let completion = tool_completion(r#"{"search_query": "0"}"#);
        let query = extract_search_query(&completion, "raw question").unwrap();
        assert_eq!(query, "raw question");
    }

    #[test]
    fn test_tool_call_missing_argument_falls_back() {
        let completion = tool_completion(r#"{}"#);
        let query = extract_search_query(&completion, "raw question").unwrap();
        assert_eq!(query, "raw question");
    }

    #[test]
    fn test_malformed_tool_arguments_error() {
        let completion = tool_completion("{not json");
        let err = extract_search_query(&completion, "raw question").unwrap_err();
        assert!(matches!(err, AppError::MalformedFunctionArguments(_)));
    }

    #[test]
    fn test_extract_from_plain_text() {
        let completion = text_completion("lease termination deadline");
        let query = extract_search_query(&completion, "raw question").unwrap();
        assert_eq!(query, "lease termination deadline");
    }

    #[test]
    fn test_plain_text_sentinel_falls_back() {
        let completion = text_completion("  0  ");
        let query = extract_search_query(&completion, "raw question").unwrap();
        assert_eq!(query, "raw question");
    }

    #[test]
    fn test_empty_choices_falls_back() {
        let completion = ChatCompletion { choices: vec![] };
        let query = extract_search_query(&completion, "raw question").unwrap();
        assert_eq!(query, "raw question");
    }

    #[test]
    fn test_query_messages_frame() {
        let history = vec![
            ChatMessage::user("What is the notice period?"),
            ChatMessage::assistant("The notice period is 30 days."),
            ChatMessage::user("And for commercial leases?"),
        ];

        let messages =
            build_query_messages("gpt-35-turbo", &history, "And for commercial leases?").unwrap();

        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0]
            .text_content()
            .unwrap()
            .contains("Generate a search query"));

        let last = messages.last().unwrap();
        assert_eq!(
            last.text_content().unwrap(),
            "Generate search query for: And for commercial leases?"
        );

        // Few-shot block sits right after the system prompt.
        assert_eq!(
            messages[1].text_content().unwrap(),
            "What was the reason for the appeal in the rental lease case?"
        );
    }

    #[test]
    fn test_query_request_parameters() {
        let request = build_query_request("gpt-35-turbo", vec![ChatMessage::user("q")]);
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.max_tokens, Some(100));
        assert_eq!(request.n, Some(1));
        assert!(!request.stream);

        let tools = request.tools.unwrap();
        assert_eq!(tools[0].function.name, "search_sources");
    }
}
