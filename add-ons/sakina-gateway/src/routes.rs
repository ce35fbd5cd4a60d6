//! HTTP surface: health probe, multipart voice turns, synthesized audio
//! retrieval, and the two WebSocket endpoints.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;
use uuid::Uuid;

use sakina_core::{TurnPipeline, Utterance};

use crate::ws::{audio_ws_handler, chat_ws_handler};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TurnPipeline>,
    pub media_dir: PathBuf,
}

pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/test", get(health))
        .route("/api/voice", post(voice_turn))
        .route("/api/audio/:filename", get(serve_audio))
        .route("/ws", get(chat_ws_handler))
        .route("/ws/audio", get(audio_ws_handler))
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"message": "Test endpoint"}))
}

/// One full voice turn over plain HTTP: multipart field `audio` carries the
/// recording, the container is taken from the uploaded filename's extension.
async fn voice_turn(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Response {
    let mut audio: Option<(Vec<u8>, String)> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("audio") {
            continue;
        }
        let container = field
            .file_name()
            .and_then(|name| name.rsplit('.').next())
            .filter(|ext| !ext.is_empty())
            .unwrap_or("webm")
            .to_string();
        match field.bytes().await {
            Ok(bytes) => audio = Some((bytes.to_vec(), container)),
            Err(e) => {
                warn!(target: "sakina::http", "voice upload read failed: {}", e);
                return error_response(StatusCode::BAD_REQUEST, "could not read audio field");
            }
        }
    }

    let Some((bytes, container)) = audio else {
        return error_response(StatusCode::BAD_REQUEST, "missing 'audio' field");
    };

    let session_id = Uuid::new_v4().to_string();
    match state
        .pipeline
        .run_turn(&session_id, Utterance::Audio { bytes, container })
        .await
    {
        // Same wire shape as the websocket channel; internal field names
        // never leave the process.
        Ok(turn) => Json(serde_json::json!({
            "transcript": turn.transcript,
            "response": turn.response_text,
            "tts_audio_url": turn.audio_url,
        }))
        .into_response(),
        Err(e) => {
            warn!(target: "sakina::http", "voice turn failed at {}: {}", e.stage(), e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

/// Serve one synthesized clip from the media directory. Filenames are
/// generated server-side as `<uuid>.mp3`; anything with a path separator
/// or parent reference is rejected outright.
async fn serve_audio(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Response {
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return error_response(StatusCode::BAD_REQUEST, "invalid filename");
    }
    let path = state.media_dir.join(&filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "audio/mpeg")], bytes).into_response(),
        Err(_) => error_response(StatusCode::NOT_FOUND, "audio not found"),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({"error": message}))).into_response()
}

/// Gateway state wired to placeholder backends. `converter_bin` substitutes
/// the ffmpeg binary (`"true"` accepts any upload, `"false"` rejects it) and
/// `transcript` is what the recognition placeholder returns.
#[cfg(test)]
pub(crate) fn placeholder_state(
    media_dir: &std::path::Path,
    work_dir: &std::path::Path,
    converter_bin: &str,
    transcript: &str,
) -> AppState {
    use sakina_core::{
        AudioConverter, CompletionBackend, ConversationLogger, IntentEmotionExtractor,
        MemoryLogger, PlaceholderCompletion, PlaceholderStt, PlaceholderTts, ResponseGenerator,
        ResponseStrategy, SafetyEvaluator, SafetyRules, SttBackend, Synthesizer, TtsBackend,
    };

    let completion: Arc<dyn CompletionBackend> =
        Arc::new(PlaceholderCompletion::with_response("رد تجريبي"));
    let pipeline = TurnPipeline::new(
        SafetyEvaluator::new(SafetyRules::default()),
        IntentEmotionExtractor::new(Arc::clone(&completion)),
        ResponseGenerator::new(ResponseStrategy::Fast, completion, None),
        Arc::new(PlaceholderStt::with_response(transcript)) as Arc<dyn SttBackend>,
        Synthesizer::new(Arc::new(PlaceholderTts) as Arc<dyn TtsBackend>, media_dir),
        AudioConverter::new(work_dir).with_binary(converter_bin),
        Arc::new(MemoryLogger::new()) as Arc<dyn ConversationLogger>,
    );
    AppState {
        pipeline: Arc::new(pipeline),
        media_dir: media_dir.to_path_buf(),
    }
}
