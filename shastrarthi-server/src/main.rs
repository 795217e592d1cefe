use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinSet;

use shastrarthi_server::config::Config;
use shastrarthi_server::identity::SupabaseIdentity;
use shastrarthi_server::metrics::Metrics;
use shastrarthi_server::provider::{CompletionProvider, GeminiProvider, PromptRegistry};
use shastrarthi_server::store;
use shastrarthi_server::transport::{
    Transport,
    http::{AppState, HttpTransport},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("shastrarthi_server={}", config.log_level).parse()?)
                .add_directive(format!("shastrarthi={}", config.log_level).parse()?),
        )
        .init();

    let limiter = store::create_rate_limiter(&config.store, config.buffer_size);

    let prompts = match &config.provider.prompts_file {
        Some(path) => PromptRegistry::with_overrides(path)?,
        None => PromptRegistry::builtin(),
    };
    tracing::debug!("Prompts available: {:?}", prompts.names());

    let provider = GeminiProvider::new(&config.provider, prompts)?;
    if !provider.is_configured() {
        tracing::warn!("GEMINI_API_KEY is not set; synthesis requests will get 503");
    }
    let identity = SupabaseIdentity::new(&config.identity)?;

    let state = Arc::new(AppState::new(
        &config.synthesis,
        limiter,
        Arc::new(provider),
        Arc::new(identity),
        Arc::new(Metrics::new()),
    ));

    let mut transport_tasks = JoinSet::new();

    let host = config.http.host.clone();
    let port = config.http.port;
    transport_tasks.spawn(async move {
        tracing::info!("Starting HTTP transport on {}:{}", host, port);
        HttpTransport::new(&host, port).start(state).await
    });

    tracing::info!(
        "Shastrarthi server started with store type: {:?}",
        config.store.store_type
    );
    tracing::info!(
        "AI rate limit: {} requests per {}ms, model {}",
        config.synthesis.rate_max_requests,
        config.synthesis.rate_window_ms,
        config.provider.model
    );

    // Transports run until they fail
    while let Some(result) = transport_tasks.join_next().await {
        match result {
            Ok(Ok(())) => {
                tracing::info!("Transport task completed successfully");
            }
            Ok(Err(e)) => {
                tracing::error!("Transport task failed: {}", e);
                return Err(e);
            }
            Err(e) => {
                tracing::error!("Transport task panicked: {}", e);
                return Err(anyhow::anyhow!("Transport task panicked"));
            }
        }
    }

    Ok(())
}
