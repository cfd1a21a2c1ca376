//! Agent Orchestration HTTP Server
//!
//! Axum-based server exposing the engine entry point, health, the agent
//! roster and persisted session traces.

mod handlers;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{EngineConfig, MemorySessionStore, ModelGateway, Orchestrator, ToolRegistry};
use agent_runtime::OllamaGateway;
use agent_toolkit::{register_tools, MemoryKnowledgeStore};

use crate::handlers::{health_check, list_agents, run_handler, session_messages};
use crate::state::{load_knowledge, load_roster, AppState};

/// Router with every endpoint and the HTTP layers
fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/agents", get(list_agents))
        .route("/api/run", post(run_handler))
        .route("/api/sessions/{id}/messages", get(session_messages))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env()?;

    // Initialize model gateway
    let gateway = Arc::new(OllamaGateway::from_env());
    match gateway.health_check().await {
        Ok(true) => {
            tracing::info!("Connected to Ollama");
            if let Ok(models) = gateway.list_models().await {
                for model in models {
                    tracing::info!(model = %model.id, "Model available");
                }
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("Ollama not available, runs will fail until it is reachable (ollama serve)");
        }
    }

    // Initialize tools
    let mut tools = ToolRegistry::new();
    register_tools(&mut tools, Arc::new(MemoryKnowledgeStore::new()), reqwest::Client::new());
    tracing::info!(count = tools.len(), tools = ?tools.names(), "Registered tools");

    // Agents and shared knowledge
    let roster = load_roster(std::env::var("AGENTS_FILE").ok().map(PathBuf::from).as_deref())?;
    tracing::info!(agents = ?roster.names(), "Loaded roster");

    let knowledge = match std::env::var("KNOWLEDGE_DIR") {
        Ok(dir) => load_knowledge(&PathBuf::from(dir))?,
        Err(_) => None,
    };

    // Build application state
    let sessions = Arc::new(MemorySessionStore::new());
    let state = AppState {
        engine: Orchestrator::new(gateway, tools, config)?.with_store(sessions.clone()),
        directory: Arc::new(roster),
        sessions,
        knowledge,
    };

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Agent server running on http://{}", addr);
    tracing::info!("  GET  /health                      - Health check");
    tracing::info!("  GET  /api/agents                  - List agents");
    tracing::info!("  POST /api/run                     - Execute a request");
    tracing::info!("  GET  /api/sessions/{{id}}/messages - Session trace");

    axum::serve(listener, app(state)).await?;

    Ok(())
}
