//! Lead Flow - Conversational lead qualification server
//!
//! Serves the sales-flow dialogue graph over WebSocket.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lead_flow::adapters::ai::{
    AnthropicConfig, AnthropicProvider, MockAIProvider, OpenAIConfig, OpenAIProvider,
};
use lead_flow::adapters::oracle::LlmOracle;
use lead_flow::adapters::persistence::{InMemoryConversationStore, SideEffectQueue};
use lead_flow::adapters::websocket::{websocket_router, WebSocketState};
use lead_flow::application::{ScheduleDemoHandler, TurnCoordinator};
use lead_flow::config::{
    AiConfig, AiProvider, AppConfig, CorsPolicy, ServerConfig, ValidationError,
};
use lead_flow::domain::conversation::{catalogue, TransitionEngine};
use lead_flow::ports::{AIError, AIProvider as CompletionProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.server.log_level.clone().into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    config.validate()?;

    let provider = build_provider(&config.ai)?;
    let info = provider.provider_info();
    tracing::info!(provider = %info.name, model = %info.model, "AI provider initialized");

    let oracle = LlmOracle::new(provider).with_temperature(config.ai.temperature);

    let store = InMemoryConversationStore::new();
    let (side_effects, worker) =
        SideEffectQueue::spawn(Arc::new(store), config.engine.side_effect_queue_capacity);
    let side_effects = Arc::new(side_effects);

    let graph = catalogue::sales_flow(ScheduleDemoHandler::binding(side_effects.clone()))?;
    tracing::info!(nodes = graph.len(), start = %graph.start_id(), "Dialogue graph loaded");

    let engine = TransitionEngine::new(
        Arc::new(graph),
        Arc::new(oracle),
        config.engine.to_settings(),
    );
    let coordinator = Arc::new(TurnCoordinator::new(Arc::new(engine), side_effects));

    let app = websocket_router()
        .with_state(WebSocketState::new(coordinator))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.server)?);

    let addr = config.server.socket_addr()?;
    tracing::info!("Lead Flow server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let stats = worker.shutdown().await;
    tracing::info!(
        applied = stats.applied,
        failed = stats.failed,
        "Side effects drained"
    );

    Ok(())
}

fn build_provider(config: &AiConfig) -> Result<Arc<dyn CompletionProvider>, AIError> {
    let secret = |key: &Option<secrecy::Secret<String>>| {
        key.as_ref()
            .map(|k| k.expose_secret().clone())
            .unwrap_or_default()
    };

    let provider: Arc<dyn CompletionProvider> = match config.primary_provider {
        AiProvider::OpenAI => {
            let mut openai = OpenAIConfig::new(secret(&config.openai_api_key))
                .with_timeout(config.timeout())
                .with_max_retries(config.max_retries);
            if let Some(model) = &config.model {
                openai = openai.with_model(model);
            }
            if let Some(url) = &config.base_url {
                openai = openai.with_base_url(url);
            }
            Arc::new(OpenAIProvider::new(openai)?)
        }
        AiProvider::Anthropic => {
            let mut anthropic = AnthropicConfig::new(secret(&config.anthropic_api_key))
                .with_timeout(config.timeout())
                .with_max_retries(config.max_retries);
            if let Some(model) = &config.model {
                anthropic = anthropic.with_model(model);
            }
            if let Some(url) = &config.base_url {
                anthropic = anthropic.with_base_url(url);
            }
            Arc::new(AnthropicProvider::new(anthropic)?)
        }
        AiProvider::Mock => {
            tracing::warn!("Using mock AI provider; every turn takes the fallback path");
            Arc::new(MockAIProvider::new())
        }
    };

    Ok(provider)
}

fn cors_layer(server: &ServerConfig) -> Result<CorsLayer, ValidationError> {
    let allow_origin = match server.cors_policy()? {
        CorsPolicy::AnyOrigin => AllowOrigin::from(Any),
        CorsPolicy::Origins(origins) => AllowOrigin::list(origins),
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
