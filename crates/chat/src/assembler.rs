//! Token-budgeted prompt assembly.
//!
//! Builds the ordered message list sent to the completion service: system
//! prompt first, few-shot examples next, as much conversation history as the
//! token ceiling allows, and the new user turn last.

use ragchat_core::AppResult;
use ragchat_llm::tokens::count_message_tokens;
use ragchat_llm::{ChatMessage, MessageContent};

/// Assemble a prompt under a token ceiling.
///
/// The system prompt, every few-shot example (in original order) and the new
/// user turn are always present. History is walked newest to oldest,
/// skipping its final entry (the new user turn replaces it), and each
/// turn is inserted after the few-shot block, preserving chronological order
/// among the inserted turns, while the running cost stays within the
/// ceiling.
///
/// The walk stops at the first turn that would exceed the ceiling; all older
/// turns are dropped, even if a smaller one would still have fit. A single
/// cutoff is cheaper than bin-packing and keeps the kept history contiguous.
///
/// Pure function of its inputs; token costs come from
/// [`count_message_tokens`].
pub fn build_messages(
    model: &str,
    system_prompt: &str,
    few_shots: &[ChatMessage],
    history: &[ChatMessage],
    new_user_content: MessageContent,
    max_tokens: u32,
) -> AppResult<Vec<ChatMessage>> {
    let mut messages = Vec::with_capacity(few_shots.len() + 2 + history.len());
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(few_shots.iter().cloned());

    // History turns are inserted here, between the few-shot block and the
    // new user turn.
    let append_index = few_shots.len() + 1;

    messages.push(ChatMessage::user_with_content(new_user_content));

    let mut total_tokens: u32 = 0;
    for message in &messages {
        total_tokens += count_message_tokens(model, message)?;
    }

    // The last history entry became the new user turn; never reinsert it.
    let prior = history
        .split_last()
        .map(|(_, rest)| rest)
        .unwrap_or_default();

    for message in prior.iter().rev() {
        let message_tokens = count_message_tokens(model, message)?;
        if total_tokens + message_tokens > max_tokens {
            tracing::info!(
                "Reached max tokens of {}, history will be truncated",
                max_tokens
            );
            break;
        }
        messages.insert(append_index, message.clone());
        total_tokens += message_tokens;
    }

    Ok(messages)
}
