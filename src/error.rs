//! Error types for the proxy.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Proxy request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream API error: {body}")]
    Upstream { status: u16, body: String },

    #[error("Failed to parse upstream response: {message}")]
    Parse { message: String },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ProxyError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// HTTP status a route handler answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Config { .. } | Self::Transport(_) | Self::Parse { .. } | Self::Toml(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        }
    }

    /// Message shown to API callers. Configuration errors carry only the
    /// underlying message so clients see e.g. `GITHUB_TOKEN not configured`.
    pub fn client_message(&self) -> String {
        match self {
            Self::Config { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
