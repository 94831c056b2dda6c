use std::sync::Arc;

use anyhow::Context;
use mailroute::config::RouterConfig;
use mailroute::router::Router;
use mailroute::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Install rustls crypto provider before any TLS usage
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    run().await.context("mailroute stopped")
}

async fn run() -> mailroute::Result<()> {
    let config = RouterConfig::from_env()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        forward = config.forward.mode(),
        fallback = config.fallback.mode(),
        default_target = config
            .default_target
            .as_ref()
            .map(|t| t.as_str())
            .unwrap_or("(none)"),
        "Starting mailroute"
    );

    let router = Router::from_config(&config).await?;

    // ── Webhook ──────────────────────────────────────────────────────────
    let listener = server::bind(config.server.port).await?;
    let state = AppState {
        router: Arc::new(router),
        route_timeout: config.server.route_timeout,
    };
    server::serve(listener, state).await
}

/// Human-readable logs by default; `LOG_FORMAT=json` for structured output.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}
