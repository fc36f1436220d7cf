use clap::Parser;
use github_models_proxy::config::config_search_paths;
use github_models_proxy::{build_router, AppState, ProxyConfig, UpstreamClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "github-models-proxy",
    about = "Anthropic- and OpenAI-compatible API proxy for GitHub Models",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Upstream base URL (overrides config and GITHUB_API_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "github_models_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = ProxyConfig::find_and_load(cli.config.as_deref())?;
    config.apply_env(|name| std::env::var(name).ok())?;

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(base_url) = cli.base_url {
        config.upstream.base_url = base_url;
    }

    if !config.upstream.has_credential() {
        warn!(
            "{} is not set; requests will fail until it is configured",
            config.upstream.api_key_env
        );
    }

    let upstream = UpstreamClient::new(&config.upstream)?;

    info!("╔═══════════════════════════════════════════════════════╗");
    info!("║           github-models-proxy v{}                  ║", env!("CARGO_PKG_VERSION"));
    info!("╚═══════════════════════════════════════════════════════╝");
    info!("  Target API: {}", upstream.endpoint());
    info!("  Port:       {}", config.port);

    let state = Arc::new(AppState { upstream });

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("");
    info!("  Endpoints:");
    info!("    POST /v1/chat/completions  OpenAI-compatible");
    info!("    POST /v1/messages          Anthropic-compatible");
    info!("    GET  /v1/models            List available models");
    info!("    GET  /health               Health check");
    info!("");
    info!("  Usage:");
    info!("    OpenAI-compatible apps: OPENAI_BASE_URL=http://localhost:{}/v1", config.port);
    info!("    Claude Code:            ANTHROPIC_BASE_URL=http://localhost:{}", config.port);
    info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
