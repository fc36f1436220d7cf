use crate::error::ProxyError;
use crate::models::{list_models, ModelEntry, ModelList};
use crate::proxy::UpstreamClient;
use crate::tokens::estimate_input_tokens;
use crate::translate::anthropic_types::{
    CountTokensRequest, CountTokensResponse, ErrorResponse, MessagesRequest,
};
use crate::translate::openai_types::{ChatCompletionRequest, ChatErrorResponse, NativeChatRequest};
use crate::translate::request::{anthropic_to_openai, native_to_upstream};

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use futures::stream::StreamExt;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Largest request body accepted on any route.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

pub struct AppState {
    pub upstream: UpstreamClient,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Wrong-method requests on known paths are acknowledged like unknown routes.
    Router::new()
        .route("/health", get(handle_health).fallback(handle_unknown))
        .route("/v1/models", get(handle_models).fallback(handle_unknown))
        .route("/v1/models/:model", get(handle_model).fallback(handle_unknown))
        .route("/v1/messages", post(handle_messages).fallback(handle_unknown))
        .route(
            "/v1/messages/count_tokens",
            post(handle_count_tokens).fallback(handle_unknown),
        )
        .route(
            "/v1/chat/completions",
            post(handle_chat_completions).fallback(handle_unknown),
        )
        .fallback(handle_unknown)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Anthropic-compatible routes
// ---------------------------------------------------------------------------

async fn handle_messages(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    if let Err(e) = state.upstream.ensure_credential() {
        return messages_error(&e);
    }

    let req: MessagesRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "failed to parse messages request");
            let err = ErrorResponse::invalid_request(format!("Invalid request body: {e}"));
            return (StatusCode::BAD_REQUEST, Json(err)).into_response();
        }
    };

    let upstream_req = anthropic_to_openai(&req);

    info!(
        model = %req.model,
        upstream_model = %upstream_req.model,
        streaming = req.stream,
        messages = req.messages.len(),
        "messages request"
    );

    if req.stream {
        handle_streaming(&state, &upstream_req, &req.model).await
    } else {
        handle_non_streaming(&state, &upstream_req, &req.model).await
    }
}

async fn handle_non_streaming(
    state: &AppState,
    upstream_req: &ChatCompletionRequest,
    client_model: &str,
) -> Response {
    match state
        .upstream
        .complete_messages(upstream_req, client_model)
        .await
    {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => messages_error(&e),
    }
}

async fn handle_streaming(
    state: &AppState,
    upstream_req: &ChatCompletionRequest,
    client_model: &str,
) -> Response {
    let sse_stream = match state.upstream.stream_messages(upstream_req, client_model).await {
        Ok(s) => s,
        Err(e) => return messages_error(&e),
    };

    let event_stream = sse_stream.map(|sse_event| {
        Ok::<_, Infallible>(Event::default().event(sse_event.event).data(sse_event.data))
    });

    Sse::new(event_stream).into_response()
}

fn messages_error(e: &ProxyError) -> Response {
    error!(error = %e, "messages request failed");
    let err = ErrorResponse::api_error(e.client_message());
    (e.status_code(), Json(err)).into_response()
}

async fn handle_count_tokens(body: Bytes) -> Response {
    let req: CountTokensRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            let err = ErrorResponse::invalid_request(format!("Invalid request body: {e}"));
            return (StatusCode::BAD_REQUEST, Json(err)).into_response();
        }
    };

    Json(CountTokensResponse {
        input_tokens: estimate_input_tokens(&req),
    })
    .into_response()
}

// ---------------------------------------------------------------------------
// OpenAI-compatible passthrough
// ---------------------------------------------------------------------------

async fn handle_chat_completions(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    if let Err(e) = state.upstream.ensure_credential() {
        return chat_error(&e);
    }

    let req: NativeChatRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "failed to parse chat completion request");
            let err = ChatErrorResponse::new("invalid_request_error", format!("Invalid request body: {e}"));
            return (StatusCode::BAD_REQUEST, Json(err)).into_response();
        }
    };

    let streaming = req.stream;
    let upstream_req = native_to_upstream(req);

    let response = match state.upstream.forward_native(&upstream_req).await {
        Ok(r) => r,
        Err(e) => return chat_error(&e),
    };
    let status = response.status();

    if streaming {
        // Already in the client's wire format; relay bytes untouched.
        return (
            status,
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            Body::from_stream(response.bytes_stream()),
        )
            .into_response();
    }

    match response.bytes().await {
        Ok(bytes) => (status, [(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(e) => chat_error(&ProxyError::from(e)),
    }
}

fn chat_error(e: &ProxyError) -> Response {
    error!(error = %e, "chat completion request failed");
    let err = ChatErrorResponse::server_error(e.client_message());
    (e.status_code(), Json(err)).into_response()
}

// ---------------------------------------------------------------------------
// Shared routes
// ---------------------------------------------------------------------------

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

async fn handle_models() -> Json<ModelList> {
    Json(list_models(Utc::now().timestamp()))
}

async fn handle_model(Path(model): Path<String>) -> Json<ModelEntry> {
    Json(ModelEntry::describe(&model, Utc::now().timestamp()))
}

/// Unknown routes are acknowledged rather than rejected, so client probes
/// (auth checks, telemetry) never see an error.
async fn handle_unknown(method: Method, uri: Uri) -> Json<serde_json::Value> {
    if uri.path().starts_with("/v1/auth") {
        info!(%method, %uri, "auth probe");
        return Json(json!({ "valid": true }));
    }

    info!(%method, %uri, "unhandled route");
    Json(json!({ "status": "ok" }))
}
