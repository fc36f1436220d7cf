//! State machine for translating `OpenAI` streaming chunks into Anthropic SSE events.
//!
//! Two layers:
//!
//! * [`decode_chunk`] maps one upstream `data:` payload to at most one event.
//!   Payloads that carry nothing translatable are an explicit
//!   [`Decoded::Skip`], never an error.
//! * [`StreamTranslator`] owns the framing. It emits `message_start` and
//!   `content_block_start` up front, reassembles upstream bytes into complete
//!   lines, decodes each `data:` line, and closes the message with
//!   `content_block_stop`, `message_delta`, `message_stop` once the `[DONE]`
//!   sentinel arrives.
//!
//! If the upstream closes without sending `[DONE]`, no closing events are
//! synthesized; [`StreamTranslator::close`] reports the stream as truncated.
//!
//! Usage:
//!   let mut translator = StreamTranslator::new("claude-sonnet-4-20250514");
//!   let opening = translator.open();
//!   for segment in upstream_bytes {
//!       let events = translator.push(&segment);
//!       // send each event as SSE
//!   }
//!   let termination = translator.close();

use super::anthropic_types::{
    Delta, DeltaUsage, MessageDeltaBody, MessagesResponse, ResponseContentBlock, StreamEvent, Usage,
};
use super::openai_types::ChatCompletionChunk;
use super::response::END_TURN;

/// Payload marking the end of an upstream stream.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data:";

/// The single content block every translated stream carries.
const TEXT_BLOCK_INDEX: usize = 0;

/// Why a payload produced no event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Empty,
    /// The `[DONE]` sentinel. The framing layer handles it, not the decoder.
    Sentinel,
    /// Not a chunk object. Partial lines end up here if a caller skips reassembly.
    Malformed,
    NoChoices,
    /// A chunk with neither text nor a finish reason (e.g. the role-only opener).
    NothingToEmit,
}

#[derive(Debug, Clone)]
pub enum Decoded {
    Event(StreamEvent),
    Skip(SkipReason),
}

/// How the upstream stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// `[DONE]` was seen and the closing events were emitted.
    Completed,
    /// The upstream went away first. `discarded_bytes` is the unterminated
    /// tail that never formed a complete line.
    Truncated { discarded_bytes: usize },
}

/// Decode one upstream `data:` payload (prefix already stripped).
pub fn decode_chunk(raw: &str) -> Decoded {
    let raw = raw.trim();
    if raw.is_empty() {
        return Decoded::Skip(SkipReason::Empty);
    }
    if raw == DONE_SENTINEL {
        return Decoded::Skip(SkipReason::Sentinel);
    }

    let chunk: ChatCompletionChunk = match serde_json::from_str(raw) {
        Ok(chunk) => chunk,
        Err(_) => return Decoded::Skip(SkipReason::Malformed),
    };

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Decoded::Skip(SkipReason::NoChoices);
    };

    if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
        return Decoded::Event(StreamEvent::ContentBlockDelta {
            index: TEXT_BLOCK_INDEX,
            delta: Delta::TextDelta { text },
        });
    }

    if choice.finish_reason.is_some_and(|r| !r.is_empty()) {
        let output_tokens = chunk.usage.map_or(0, |u| u.completion_tokens);
        return Decoded::Event(message_delta(output_tokens));
    }

    Decoded::Skip(SkipReason::NothingToEmit)
}

/// Per-request translator from upstream SSE bytes to Anthropic stream events.
#[derive(Debug)]
pub struct StreamTranslator {
    model: String,
    msg_id: String,
    /// Bytes after the last newline seen so far.
    pending: Vec<u8>,
    finished: bool,
}

impl StreamTranslator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            msg_id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
            pending: Vec::new(),
            finished: false,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.msg_id
    }

    /// Whether `[DONE]` has been processed. Later input is ignored.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Events to send as soon as the stream opens, before any upstream data.
    pub fn open(&self) -> Vec<StreamEvent> {
        vec![
            StreamEvent::MessageStart {
                message: MessagesResponse {
                    id: self.msg_id.clone(),
                    response_type: "message".to_string(),
                    role: "assistant".to_string(),
                    model: self.model.clone(),
                    content: Vec::new(),
                    stop_reason: None,
                    stop_sequence: None,
                    usage: Usage::default(),
                },
            },
            StreamEvent::ContentBlockStart {
                index: TEXT_BLOCK_INDEX,
                content_block: ResponseContentBlock::Text {
                    text: String::new(),
                },
            },
        ]
    }

    /// Feed one segment of upstream bytes, returning the events for every
    /// line it completes. A trailing partial line is held until the next push.
    pub fn push(&mut self, segment: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.pending.extend_from_slice(segment);

        let mut consumed = 0;
        while let Some(offset) = self.pending[consumed..].iter().position(|&b| b == b'\n') {
            let line = String::from_utf8_lossy(&self.pending[consumed..consumed + offset]);
            consumed += offset + 1;

            let Some(payload) = line.strip_prefix(DATA_PREFIX).map(str::trim) else {
                continue;
            };

            if payload == DONE_SENTINEL {
                events.extend(closing_events());
                self.finished = true;
                break;
            }

            match decode_chunk(payload) {
                Decoded::Event(event) => events.push(event),
                Decoded::Skip(reason) => {
                    tracing::trace!(?reason, "skipping upstream chunk");
                }
            }
        }

        if self.finished {
            self.pending.clear();
        } else {
            self.pending.drain(..consumed);
        }

        events
    }

    /// Consume the translator once the upstream byte stream has ended.
    pub fn close(self) -> Termination {
        if self.finished {
            Termination::Completed
        } else {
            Termination::Truncated {
                discarded_bytes: self.pending.len(),
            }
        }
    }
}

fn message_delta(output_tokens: u64) -> StreamEvent {
    StreamEvent::MessageDelta {
        delta: MessageDeltaBody {
            stop_reason: Some(END_TURN.to_string()),
            stop_sequence: None,
        },
        usage: DeltaUsage { output_tokens },
    }
}

fn closing_events() -> [StreamEvent; 3] {
    [
        StreamEvent::ContentBlockStop {
            index: TEXT_BLOCK_INDEX,
        },
        message_delta(0),
        StreamEvent::MessageStop,
    ]
}
