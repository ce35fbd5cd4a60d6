//! Axum gateway for the Sakina voice assistant: HTTP voice turns, chunked
//! audio streaming over WebSocket, and serving of synthesized replies.

mod routes;
mod store;
mod ws;

use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use sakina_core::{ConversationLogger, MemoryLogger, PipelineConfig, TurnPipeline};

use routes::{build_app, AppState};
use store::SqliteLog;

#[tokio::main]
async fn main() {
    // Keys live in the backend environment only; the frontend never sees them.
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[sakina-gateway] .env not loaded: {} (using system environment)", e);
    }
    if std::env::var("SAKINA_LLM_API_KEY").is_err() && std::env::var("OPENAI_API_KEY").is_err() {
        eprintln!("[sakina-gateway] Hint: set SAKINA_LLM_API_KEY or OPENAI_API_KEY in .env for live replies; without it the assistant answers with a canned placeholder.");
    }
    if std::env::var("AZURE_SPEECH_KEY").is_err() {
        eprintln!("[sakina-gateway] Hint: set AZURE_SPEECH_KEY and AZURE_SERVICE_REGION for speech recognition and synthesis.");
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PipelineConfig::from_env();
    if let Err(e) = tokio::fs::create_dir_all(&config.media_dir).await {
        eprintln!("[sakina-gateway] cannot create media dir {}: {}", config.media_dir.display(), e);
        std::process::exit(1);
    }
    if let Err(e) = tokio::fs::create_dir_all(&config.work_dir).await {
        eprintln!("[sakina-gateway] cannot create work dir {}: {}", config.work_dir.display(), e);
        std::process::exit(1);
    }

    let db_path = std::env::var("SAKINA_DB_PATH")
        .unwrap_or_else(|_| "sakina_conversations.db".to_string());
    let logger: Arc<dyn ConversationLogger> = match SqliteLog::new(db_path.clone().into()) {
        Ok(store) => {
            tracing::info!(target: "sakina::gateway", "conversation log at {}", db_path);
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(target: "sakina::gateway", "sqlite unavailable ({}), falling back to in-memory log", e);
            Arc::new(MemoryLogger::new())
        }
    };

    let pipeline = Arc::new(TurnPipeline::from_env(&config, logger));
    let state = AppState {
        pipeline,
        media_dir: config.media_dir.clone(),
    };
    let app = build_app(state);

    let addr = std::env::var("SAKINA_BIND").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    tracing::info!(target: "sakina::gateway", "listening on {}", addr);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("[sakina-gateway] cannot bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("[sakina-gateway] server error: {}", e);
        std::process::exit(1);
    }
}
