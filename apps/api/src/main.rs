mod catalog;
mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod resume;
mod routes;
mod scoring;
mod session;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::catalog::backend::PgTestBackend;
use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::llm_client::LlmClient;
use crate::resume::LlmResumeExtractor;
use crate::routes::build_router;
use crate::scoring::ScoringPipeline;
use crate::session::controller::{spawn_ticker, SessionController};
use crate::session::pg_store::PgSessionStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (aborts on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interview API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;

    // Initialize reasoning-service client
    let llm = Arc::new(LlmClient::new(config.gemini_api_key.clone())?);
    if llm.is_configured() {
        info!("LLM client initialized (model: {})", llm_client::MODEL);
    } else {
        warn!("GEMINI_API_KEY not set: scores will be 0 and generation is unavailable");
    }

    let pipeline = ScoringPipeline::new(llm.clone());
    let backend = Arc::new(PgTestBackend::new(db.clone(), pipeline.clone()));
    let extractor = Arc::new(LlmResumeExtractor::new(llm));

    // Session controller: durable store, in-process countdowns
    let store = Arc::new(PgSessionStore::new(db.clone()));
    let controller = SessionController::new(store, backend.clone());
    controller.recover().await?;
    spawn_ticker(controller.clone());

    // Build app state
    let state = AppState {
        db,
        config: config.clone(),
        pipeline,
        backend,
        extractor,
        controller,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the candidate frontend has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
