//! Industria HTTP Server
//!
//! Axum-based REST API. Each conversation is one maintenance session; the
//! safety policy runs on every turn no matter what the model says.

mod handlers;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::LlmProvider;
use agent_runtime::OllamaProvider;
use industria::{IndustriaConfig, InMemoryTicketSink, MockTelemetryProvider, SessionFactory};

use crate::handlers::{
    chat_handler, create_session, delete_session, get_session, health_check, list_models,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = IndustriaConfig::from_env()?;
    let provider: Arc<dyn LlmProvider> = Arc::new(OllamaProvider::from_env());

    // Verify the reasoning engine is reachable
    match provider.health_check().await {
        Ok(true) => {
            tracing::info!("✓ Connected to Ollama");
            if let Ok(models) = provider.list_models().await {
                for model in models {
                    tracing::info!("  Model: {}", model.id);
                }
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ Ollama not available - turns will degrade until it is");
            tracing::warn!("  Make sure Ollama is running: ollama serve");
            tracing::warn!("  and the model is pulled: ollama pull {}", config.model);
        }
    }

    // Collaborators
    let telemetry = Arc::new(MockTelemetryProvider::demo());
    tracing::info!("Telemetry fleet: {}", telemetry.machine_ids().join(", "));
    let sink = Arc::new(InMemoryTicketSink::new());

    let factory = SessionFactory::new(&config, provider.clone(), telemetry, sink.clone())?;
    tracing::info!(
        warning_c = config.thresholds.warning_c,
        critical_above_c = config.thresholds.critical_above_c,
        model = %config.model,
        "Registered {} capabilities: {}",
        factory.agent().tools().len(),
        factory.agent().tools().names().join(", ")
    );

    let state = AppState::new(provider, factory, sink, config.session_idle_timeout);

    // Conversations that go quiet are ended rather than kept forever
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            sweeper.sweep_idle().await;
        }
    });

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))
        // Conversations
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/chat", post(chat_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🏭 Industria server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health             - Health check");
    tracing::info!("  GET    /api/models         - List available models");
    tracing::info!("  POST   /api/sessions       - Open a conversation");
    tracing::info!("  POST   /api/chat           - Send message");
    tracing::info!("  GET    /api/sessions/{{id}}  - Conversation transcript");
    tracing::info!("  DELETE /api/sessions/{{id}}  - End a conversation");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
