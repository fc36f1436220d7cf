//! Translate client requests into `OpenAI` Chat Completions requests.
//!
//! Anthropic-style messages are flattened to one plain-text `OpenAI` message
//! each: every content block becomes one line, and block types the upstream
//! cannot represent are replaced by a short bracketed placeholder. Native
//! `OpenAI` requests only get their model resolved and `max_tokens` clamped.

use std::borrow::Cow;

use super::anthropic_types::{ContentBlock, Message, MessageContent, MessagesRequest, SystemContent};
use super::openai_types::{
    ChatCompletionRequest, ChatMessage, NativeChatRequest, PassthroughFields, StopSequences,
    PASSTHROUGH_FIELDS,
};
use crate::models::{clamp_max_tokens, resolve_model};

/// Translate an Anthropic Messages API request into an `OpenAI` Chat Completions request.
/// Pure function: model resolution and clamping use static tables only.
pub fn anthropic_to_openai(req: &MessagesRequest) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: resolve_model(&req.model).to_string(),
        messages: translate_messages(&req.messages, req.system.as_ref()),
        max_tokens: Some(clamp_max_tokens(req.max_tokens)),
        temperature: Some(req.temperature),
        top_p: req.top_p,
        stop: req.stop_sequences.clone().map(StopSequences::Many),
        stream: Some(req.stream),
        passthrough: PassthroughFields::new(),
    }
}

/// Convert the conversation, prepending the system prompt when it is non-empty.
pub fn translate_messages(messages: &[Message], system: Option<&SystemContent>) -> Vec<ChatMessage> {
    let system = system.map(SystemContent::as_text).filter(|s| !s.is_empty());

    system
        .map(|content| ChatMessage {
            role: "system".to_string(),
            content,
        })
        .into_iter()
        .chain(messages.iter().filter_map(translate_message))
        .collect()
}

fn translate_message(msg: &Message) -> Option<ChatMessage> {
    let content = match msg.content.as_ref()? {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Blocks(blocks) => flatten_blocks(blocks),
    };

    Some(ChatMessage {
        role: msg.role.upstream_role().to_string(),
        content,
    })
}

/// Join the text form of each block with newlines, in order. Unknown blocks
/// contribute no line at all.
pub fn flatten_blocks(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(flatten_block)
        .collect::<Vec<_>>()
        .join("\n")
}

fn flatten_block(block: &ContentBlock) -> Option<Cow<'_, str>> {
    let line = match block {
        ContentBlock::Text { text } => Cow::Borrowed(text.as_str()),
        ContentBlock::Image { source } => {
            let media_type = source
                .as_ref()
                .and_then(|s| s.media_type.as_deref())
                .filter(|m| !m.is_empty())
                .unwrap_or("image");
            Cow::Owned(format!("[Image: {media_type}]"))
        }
        ContentBlock::ToolUse { name } => Cow::Owned(format!("[Tool call: {name}]")),
        ContentBlock::ToolResult { content } => match content {
            None => Cow::Borrowed(""),
            Some(serde_json::Value::String(text)) => Cow::Borrowed(text.as_str()),
            Some(other) => Cow::Owned(other.to_string()),
        },
        ContentBlock::Unknown => return None,
    };
    Some(line)
}

/// Prepare a native `OpenAI` request for the provider: resolve the model,
/// clamp the token ceiling, and keep only the known passthrough fields.
pub fn native_to_upstream(req: NativeChatRequest) -> ChatCompletionRequest<serde_json::Value> {
    // Zero counts as unset, matching clients that send 0 for "no limit".
    let max_tokens = req
        .max_completion_tokens
        .filter(|t| *t > 0)
        .or(req.max_tokens.filter(|t| *t > 0))
        .map(clamp_max_tokens);

    let passthrough = req
        .extra
        .into_iter()
        .filter(|(key, _)| PASSTHROUGH_FIELDS.contains(&key.as_str()))
        .collect();

    ChatCompletionRequest {
        model: resolve_model(&req.model).to_string(),
        messages: req.messages,
        max_tokens,
        temperature: req.temperature,
        top_p: req.top_p,
        stop: req.stop,
        stream: req.stream.then_some(true),
        passthrough,
    }
}
