use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request types (what Anthropic-style clients send TO us)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemContent>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

fn default_max_tokens() -> u64 {
    4096
}

fn default_temperature() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemContent {
    Text(String),
    Blocks(Vec<SystemBlock>),
}

/// Only text blocks contribute to the system prompt; anything else,
/// including blocks without a `type`, is [`SystemBlock::Unknown`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", from = "serde_json::Value")]
pub enum SystemBlock {
    Text { text: String },
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, deserialize_with = "lenient_role")]
    pub role: Role,
    /// Messages without content produce nothing upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
}

/// Role as sent by the client. Anything unrecognized lands in `Unrecognized`
/// and is forwarded as `user`, same as a missing or `null` role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Assistant,
    System,
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// One typed unit of message content. Blocks whose `type` is missing or not
/// one we know become [`ContentBlock::Unknown`] and flatten to nothing;
/// `null` fields read as absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", from = "serde_json::Value")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<ImageSource>,
    },
    ToolUse {
        /// Empty when the client sent no name.
        name: String,
    },
    ToolResult {
        /// Either a plain string or any structured JSON value.
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<serde_json::Value>,
    },
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// Body of `POST /v1/messages/count_tokens`. Content stays untyped because
/// non-text blocks are counted by their serialized size.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountTokensRequest {
    #[serde(default)]
    pub messages: Vec<CountTokensMessage>,
    #[serde(default)]
    pub system: Option<SystemContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountTokensMessage {
    #[serde(default)]
    pub content: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountTokensResponse {
    pub input_tokens: u64,
}

// ---------------------------------------------------------------------------
// Response types (what we send BACK to the client)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub response_type: String, // "message"
    pub role: String,          // "assistant"
    pub model: String,
    pub content: Vec<ResponseContentBlock>,
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
    pub usage: Usage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

// ---------------------------------------------------------------------------
// Streaming event types (SSE events we send back to the client)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "message_start")]
    MessageStart { message: MessagesResponse },
    #[serde(rename = "content_block_start")]
    ContentBlockStart {
        index: usize,
        content_block: ResponseContentBlock,
    },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { index: usize, delta: Delta },
    #[serde(rename = "content_block_stop")]
    ContentBlockStop { index: usize },
    #[serde(rename = "message_delta")]
    MessageDelta {
        delta: MessageDeltaBody,
        usage: DeltaUsage,
    },
    #[serde(rename = "message_stop")]
    MessageStop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Delta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
}

/// Both fields are always serialized, `null` included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDeltaBody {
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaUsage {
    pub output_tokens: u64,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub error_type: String,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: impl Into<String>) -> Self {
        Self {
            error_type: "error".to_string(),
            error: ErrorBody {
                error_type: error_type.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new("invalid_request_error", msg)
    }

    pub fn api_error(msg: impl Into<String>) -> Self {
        Self::new("api_error", msg)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl SystemContent {
    pub fn as_text(&self) -> String {
        match self {
            SystemContent::Text(t) => t.clone(),
            SystemContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    SystemBlock::Text { text } => Some(text.as_str()),
                    SystemBlock::Unknown => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

fn str_field<'a>(raw: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    raw.get(key).and_then(serde_json::Value::as_str)
}

impl From<serde_json::Value> for ContentBlock {
    fn from(raw: serde_json::Value) -> Self {
        match str_field(&raw, "type") {
            Some("text") => ContentBlock::Text {
                text: str_field(&raw, "text").unwrap_or_default().to_string(),
            },
            Some("image") => ContentBlock::Image {
                source: raw.get("source").filter(|s| !s.is_null()).map(|source| ImageSource {
                    media_type: str_field(source, "media_type").map(str::to_string),
                }),
            },
            Some("tool_use") => ContentBlock::ToolUse {
                name: str_field(&raw, "name").unwrap_or_default().to_string(),
            },
            Some("tool_result") => ContentBlock::ToolResult {
                content: raw.get("content").filter(|c| !c.is_null()).cloned(),
            },
            _ => ContentBlock::Unknown,
        }
    }
}

impl From<serde_json::Value> for SystemBlock {
    fn from(raw: serde_json::Value) -> Self {
        match (str_field(&raw, "type"), str_field(&raw, "text")) {
            (Some("text"), Some(text)) => SystemBlock::Text {
                text: text.to_string(),
            },
            _ => SystemBlock::Unknown,
        }
    }
}

fn lenient_role<'de, D>(deserializer: D) -> Result<Role, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw.as_ref().and_then(serde_json::Value::as_str) {
        None | Some("user") => Role::User,
        Some("assistant") => Role::Assistant,
        Some("system") => Role::System,
        Some(_) => Role::Unrecognized,
    })
}

impl Role {
    /// The upstream dialect only knows two conversational roles here.
    #[must_use]
    pub fn upstream_role(self) -> &'static str {
        match self {
            Role::Assistant => "assistant",
            Role::User | Role::System | Role::Unrecognized => "user",
        }
    }
}

impl StreamEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::MessageStart { .. } => "message_start",
            StreamEvent::ContentBlockStart { .. } => "content_block_start",
            StreamEvent::ContentBlockDelta { .. } => "content_block_delta",
            StreamEvent::ContentBlockStop { .. } => "content_block_stop",
            StreamEvent::MessageDelta { .. } => "message_delta",
            StreamEvent::MessageStop => "message_stop",
        }
    }
}
