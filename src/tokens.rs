//! Rough input-token estimate for `/v1/messages/count_tokens`.
//!
//! No tokenizer is involved: the estimate is one token per four characters of
//! prompt text, rounded up.

use serde_json::Value;

use crate::translate::anthropic_types::{CountTokensRequest, SystemContent};

const CHARS_PER_TOKEN: u64 = 4;

pub fn estimate_input_tokens(req: &CountTokensRequest) -> u64 {
    let system_chars = req
        .system
        .as_ref()
        .map_or(0, |system| char_count(&SystemContent::as_text(system)));

    let message_chars: u64 = req
        .messages
        .iter()
        .filter_map(|msg| msg.content.as_ref())
        .map(content_chars)
        .sum();

    (system_chars + message_chars).div_ceil(CHARS_PER_TOKEN)
}

fn content_chars(content: &Value) -> u64 {
    match content {
        Value::String(text) => char_count(text),
        Value::Array(blocks) => blocks.iter().map(block_chars).sum(),
        _ => 0,
    }
}

/// Text blocks count their text; any other block counts its compact JSON form.
fn block_chars(block: &Value) -> u64 {
    if block.get("type").and_then(Value::as_str) == Some("text") {
        return block.get("text").and_then(Value::as_str).map_or(0, char_count);
    }
    char_count(&block.to_string())
}

fn char_count(s: &str) -> u64 {
    s.chars().count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn estimate(body: Value) -> u64 {
        estimate_input_tokens(&serde_json::from_value(body).unwrap())
    }

    #[test]
    fn test_string_content_rounds_up() {
        assert_eq!(estimate(json!({"messages": [{"role": "user", "content": "hello"}]})), 2);
        assert_eq!(estimate(json!({"messages": [{"role": "user", "content": "abcd"}]})), 1);
    }

    #[test]
    fn test_empty_request_is_zero() {
        assert_eq!(estimate(json!({})), 0);
        assert_eq!(estimate(json!({"messages": []})), 0);
    }

    #[test]
    fn test_system_prompt_counts() {
        assert_eq!(
            estimate(json!({"system": "12345678", "messages": [{"role": "user", "content": "1234"}]})),
            3
        );
        assert_eq!(
            estimate(json!({"system": [{"type": "text", "text": "1234"}], "messages": []})),
            1
        );
    }

    #[test]
    fn test_non_text_blocks_count_their_json() {
        let image = json!({"type": "image", "source": {"media_type": "image/png"}});
        let image_chars = image.to_string().chars().count() as u64;
        let expected = (4 + image_chars).div_ceil(4);

        assert_eq!(
            estimate(json!({"messages": [{
                "role": "user",
                "content": [{"type": "text", "text": "abcd"}, image],
            }]})),
            expected
        );
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        assert_eq!(estimate(json!({"messages": [{"role": "user", "content": "éééé"}]})), 1);
    }
}
