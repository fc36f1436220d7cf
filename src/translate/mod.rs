//! Translation between the Anthropic Messages dialect and the `OpenAI` Chat
//! Completions dialect spoken by GitHub Models.
//!
//! Requests go one way, responses and stream events the other. Nothing in
//! this module performs I/O.

pub mod anthropic_types;
pub mod openai_types;
pub mod request;
pub mod response;
pub mod streaming;
