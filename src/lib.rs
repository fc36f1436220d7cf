pub mod config;
pub mod error;
pub mod models;
pub mod proxy;
pub mod server;
pub mod tokens;
pub mod translate;

pub use config::ProxyConfig;
pub use error::{ProxyError, Result};
pub use proxy::UpstreamClient;
pub use server::{build_router, AppState};
