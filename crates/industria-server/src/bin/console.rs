//! Industria terminal console
//!
//! One maintenance session on stdin/stdout. `exit`, `quit` or EOF ends it.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::LlmProvider;
use agent_runtime::OllamaProvider;
use industria::{
    ConsoleSurface, IndustriaConfig, InMemoryTicketSink, MockTelemetryProvider, SessionFactory,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let config = IndustriaConfig::from_env()?;
    let provider = Arc::new(OllamaProvider::from_env());

    if !provider.health_check().await.unwrap_or(false) {
        eprintln!("⚠ Ollama is not reachable at {}.", provider.endpoint());
        eprintln!("  Start it with `ollama serve` and pull the model: ollama pull {}", config.model);
        eprintln!("  Turns will report the engine as unavailable until then.\n");
    }

    let telemetry = Arc::new(MockTelemetryProvider::demo());
    let machines = telemetry.machine_ids().join(", ");
    let sink = Arc::new(InMemoryTicketSink::new());
    let factory = SessionFactory::new(&config, provider, telemetry, sink.clone())?;

    println!("🏭 Industria maintenance console ({})", config.model);
    println!("   Machines: {machines}");
    println!("   Type 'exit' to leave.\n");

    let mut session = factory.session();
    let mut surface = ConsoleSurface::new();
    let turns = session.run(&mut surface).await;

    let tickets = sink.tickets().await;
    println!("\nSession over: {turns} turn(s), {} ticket(s) logged.", tickets.len());
    for ticket in tickets {
        println!("  [{}] {} - {}", ticket.priority, ticket.machine_id, ticket.issue);
    }

    Ok(())
}
