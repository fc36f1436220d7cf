//! HTTP client for the upstream chat-completions provider.
//!
//! Holds one `reqwest::Client` for the life of the process. Every call checks
//! the credential before touching the network.

use crate::config::UpstreamConfig;
use crate::error::{ProxyError, Result};
use crate::translate::anthropic_types::{MessagesResponse, StreamEvent};
use crate::translate::openai_types::{ChatCompletionRequest, ChatCompletionResponse};
use crate::translate::response::openai_to_anthropic;
use crate::translate::streaming::{StreamTranslator, Termination};

use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// A translated streaming response: one item per outbound SSE event.
pub type SseStream = Pin<Box<dyn Stream<Item = SseEvent> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: &'static str,
    pub data: String,
}

impl TryFrom<&StreamEvent> for SseEvent {
    type Error = serde_json::Error;

    fn try_from(event: &StreamEvent) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            event: event.event_name(),
            data: serde_json::to_string(event)?,
        })
    }
}

#[derive(Debug)]
pub struct UpstreamClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    api_key_env: String,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.completions_url(),
            api_key: config
                .api_key
                .as_ref()
                .map(|key| SecretString::from(key.expose_secret().to_owned())),
            api_key_env: config.api_key_env.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn api_key(&self) -> Result<&SecretString> {
        self.api_key
            .as_ref()
            .ok_or_else(|| ProxyError::config(format!("{} not configured", self.api_key_env)))
    }

    /// Fails with `ProxyError::Config` when no credential is configured.
    pub fn ensure_credential(&self) -> Result<()> {
        self.api_key().map(|_| ())
    }

    /// POST a JSON body to the completions endpoint and hand back the raw response.
    ///
    /// # Errors
    /// `ProxyError::Config` when no credential is configured (no request is made),
    /// `ProxyError::Transport` when the request cannot be sent.
    pub async fn send<T: Serialize + ?Sized>(&self, body: &T) -> Result<reqwest::Response> {
        let api_key = self.api_key()?;

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key.expose_secret())
            .json(body)
            .send()
            .await?;

        Ok(response)
    }

    /// Forward a translated request and translate the buffered reply.
    pub async fn complete_messages(
        &self,
        req: &ChatCompletionRequest,
        client_model: &str,
    ) -> Result<MessagesResponse> {
        info!(endpoint = %self.endpoint, model = %req.model, "forwarding messages request");

        let response = self.send(req).await?;
        let status = response.status();
        let body = response.text().await?;

        debug!(status = status.as_u16(), body_len = body.len(), "upstream response");

        if !status.is_success() {
            warn!(status = status.as_u16(), body = truncate(&body, 500), "upstream error");
            return Err(ProxyError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let upstream: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            ProxyError::parse(format!("{e}. Body: {}", truncate(&body, 300)))
        })?;

        let translated = openai_to_anthropic(&upstream, client_model);

        info!(
            input_tokens = translated.usage.input_tokens,
            output_tokens = translated.usage.output_tokens,
            "completed"
        );

        Ok(translated)
    }

    /// Forward a translated streaming request. Upstream failures reported
    /// before the first byte surface as errors; afterwards the stream just ends.
    pub async fn stream_messages(
        &self,
        req: &ChatCompletionRequest,
        client_model: &str,
    ) -> Result<SseStream> {
        info!(endpoint = %self.endpoint, model = %req.model, "forwarding messages request (streaming)");

        let response = self.send(req).await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = truncate(&body, 300), "upstream streaming error");
            return Err(ProxyError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let translator = StreamTranslator::new(client_model);
        Ok(Box::pin(translate_event_stream(response.bytes_stream(), translator)))
    }

    /// Forward a native request untouched apart from what the caller already
    /// rewrote. The response is relayed by the caller as-is.
    pub async fn forward_native(
        &self,
        req: &ChatCompletionRequest<serde_json::Value>,
    ) -> Result<reqwest::Response> {
        info!(
            endpoint = %self.endpoint,
            model = %req.model,
            streaming = req.stream.unwrap_or(false),
            "forwarding chat completion"
        );
        self.send(req).await
    }
}

/// Drive a [`StreamTranslator`] over an upstream byte stream.
///
/// Dropping the returned stream drops `byte_stream` with it, which closes the
/// upstream connection when the client goes away.
pub fn translate_event_stream<S, E>(
    byte_stream: S,
    mut translator: StreamTranslator,
) -> impl Stream<Item = SseEvent> + Send + 'static
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        for event in translator.open() {
            if let Ok(sse) = SseEvent::try_from(&event) {
                yield sse;
            }
        }

        tokio::pin!(byte_stream);

        while let Some(segment) = byte_stream.next().await {
            let segment = match segment {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(message_id = translator.message_id(), "upstream stream error: {e}");
                    break;
                }
            };

            for event in translator.push(&segment) {
                if let Ok(sse) = SseEvent::try_from(&event) {
                    yield sse;
                }
            }

            if translator.is_finished() {
                break;
            }
        }

        let message_id = translator.message_id().to_owned();
        match translator.close() {
            Termination::Completed => info!(%message_id, "stream completed"),
            Termination::Truncated { discarded_bytes } => warn!(
                %message_id,
                discarded_bytes,
                "upstream closed without [DONE]; ending stream without closing events"
            ),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
