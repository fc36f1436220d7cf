use chrono::Utc;

use super::anthropic_types::{MessagesResponse, ResponseContentBlock, Usage};
use super::openai_types::ChatCompletionResponse;

/// The only stop reason this proxy reports, on both the buffered and the
/// streaming path. Upstream finish reasons are not mapped.
pub const END_TURN: &str = "end_turn";

/// Translate an `OpenAI` Chat Completion response into an Anthropic Messages response.
/// Pure apart from the id fallback: `client_model` is what the client originally requested.
pub fn openai_to_anthropic(resp: &ChatCompletionResponse, client_model: &str) -> MessagesResponse {
    // Only the first choice is used
    let content = resp
        .choices
        .first()
        .and_then(|c| c.message.content.as_deref())
        .filter(|text| !text.is_empty())
        .map(|text| {
            vec![ResponseContentBlock::Text {
                text: text.to_string(),
            }]
        })
        .unwrap_or_default();

    let usage = resp.usage.as_ref().map_or_else(Usage::default, |u| Usage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
    });

    MessagesResponse {
        id: message_id(resp.id.as_deref()),
        response_type: "message".to_string(),
        role: "assistant".to_string(),
        model: client_model.to_string(),
        content,
        stop_reason: Some(END_TURN.to_string()),
        stop_sequence: None,
        usage,
    }
}

/// `msg_` + the upstream id, or + the current unix time in milliseconds
/// when the upstream sent none.
fn message_id(upstream_id: Option<&str>) -> String {
    match upstream_id.filter(|id| !id.is_empty()) {
        Some(id) => format!("msg_{id}"),
        None => format!("msg_{}", Utc::now().timestamp_millis()),
    }
}
