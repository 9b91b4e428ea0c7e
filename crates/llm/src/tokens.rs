//! Token accounting for prompt budgeting.
//!
//! The message assembler budgets prompts against a model's token limit, so
//! the cost of a message must be estimated before it is sent. Counting uses
//! the cl100k tokenizer shared by the supported chat model families.
//!
//! Cost of a message = fixed per-message overhead + role-name tokens +
//! content tokens. Image parts have a detail-dependent cost; messages with no
//! countable content fail with `UnsupportedContent`.

use once_cell::sync::Lazy;
use ragchat_core::{AppError, AppResult};
use tiktoken_rs::CoreBPE;

use crate::message::{ChatMessage, ContentPart, ImageDetail, MessageContent};

/// Framing overhead charged per message (role/content delimiters).
const MESSAGE_OVERHEAD_TOKENS: u32 = 2;

/// Base cost of any image part.
const IMAGE_BASE_TOKENS: u32 = 85;

/// Cost of one 512px image tile at high detail.
const IMAGE_TILE_TOKENS: u32 = 170;

static CL100K: Lazy<CoreBPE> =
    Lazy::new(|| tiktoken_rs::cl100k_base().expect("cl100k vocabulary is embedded"));

/// Get the prompt token limit for a chat model.
///
/// Unknown models are an error: budgeting against a guessed limit would
/// silently over- or under-truncate history.
pub fn model_token_limit(model: &str) -> AppResult<u32> {
    match model {
        "gpt-35-turbo" | "gpt-3.5-turbo" => Ok(4000),
        "gpt-35-turbo-16k" | "gpt-3.5-turbo-16k" => Ok(16000),
        "gpt-4" => Ok(8100),
        "gpt-4-32k" => Ok(32000),
        other => Err(AppError::Llm(format!(
            "Expected model gpt-35-turbo and above, got: {}",
            other
        ))),
    }
}

/// Count the tokens in a plain text string.
pub fn count_text_tokens(text: &str) -> u32 {
    CL100K.encode_ordinary(text).len() as u32
}

/// Cost of an image part by detail level.
///
/// Low detail is a flat 85 tokens. High and auto detail cost the 85-token
/// base plus 170 tokens per 512px tile; URLs are opaque here, so a single
/// tile is assumed.
pub fn count_image_tokens(detail: Option<ImageDetail>) -> u32 {
    match detail {
        Some(ImageDetail::Low) => IMAGE_BASE_TOKENS,
        _ => IMAGE_BASE_TOKENS + IMAGE_TILE_TOKENS,
    }
}

/// Estimate the token cost of one message for the given model.
///
/// The model must be one of the supported chat families (they share the
/// cl100k encoding). Messages without content (tool-call-only assistant
/// turns) cannot be encoded and fail with `UnsupportedContent`.
pub fn count_message_tokens(model: &str, message: &ChatMessage) -> AppResult<u32> {
    // Validates the model family; all supported models tokenize with cl100k.
    model_token_limit(model)?;

    let mut tokens = MESSAGE_OVERHEAD_TOKENS + count_text_tokens(message.role.as_str());

    match &message.content {
        Some(MessageContent::Text(text)) => {
            tokens += count_text_tokens(text);
        }
        Some(MessageContent::Parts(parts)) => {
            for part in parts {
                match part {
                    ContentPart::Text { text } => tokens += count_text_tokens(text),
                    ContentPart::ImageUrl { image_url } => {
                        tokens += count_image_tokens(image_url.detail)
                    }
                }
            }
        }
        None => {
            return Err(AppError::UnsupportedContent(
                "message has no text or multipart content".to_string(),
            ));
        }
    }

    Ok(tokens)
}
