//! WebSocket handlers for text chat and chunked-audio streaming.
//!
//! Both frame loops are generic over the message stream/sink so they can be
//! driven without a live socket.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use sakina_core::{parse_control, AudioStreamAssembler, StreamControl, Utterance};

use crate::routes::AppState;

#[derive(Deserialize)]
struct ChatFrame {
    message: String,
}

/// Text chat socket: one JSON request per frame, one JSON reply per turn.
pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket: WebSocket| async move {
        drive_chat(socket, state).await;
    })
}

async fn drive_chat<S>(mut socket: S, state: AppState)
where
    S: Stream<Item = Result<Message, axum::Error>> + Sink<Message> + Unpin,
{
    let session_id = Uuid::new_v4().to_string();
    info!(target: "sakina::ws", "chat session {} connected", session_id);

    while let Some(Ok(msg)) = socket.next().await {
        match msg {
            Message::Text(text) => {
                let reply = chat_reply(&state, &session_id, &text).await;
                if socket.send(Message::Text(reply)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    info!(target: "sakina::ws", "chat session {} closed", session_id);
}

/// One chat frame in, one JSON reply out. Invalid JSON answers with a fixed
/// error frame; the caller keeps the loop open either way.
async fn chat_reply(state: &AppState, session_id: &str, text: &str) -> String {
    let frame: ChatFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(_) => return serde_json::json!({"error": "Invalid JSON format"}).to_string(),
    };
    match state
        .pipeline
        .run_turn(session_id, Utterance::Text(frame.message))
        .await
    {
        Ok(turn) => serde_json::json!({
            "transcript": turn.transcript,
            "response": turn.response_text,
            "tts_audio_url": turn.audio_url,
        })
        .to_string(),
        Err(e) => {
            warn!(target: "sakina::ws", "chat session {}: turn failed: {}", session_id, e);
            serde_json::json!({"error": e.to_string()}).to_string()
        }
    }
}

/// Streaming audio socket: binary frames accumulate, a text control frame
/// `{"event": "end"}` finalizes the utterance and runs the turn.
pub async fn audio_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket: WebSocket| async move {
        drive_audio(socket, state).await;
    })
}

async fn drive_audio<S>(mut socket: S, state: AppState)
where
    S: Stream<Item = Result<Message, axum::Error>> + Sink<Message> + Unpin,
{
    let mut assembler = AudioStreamAssembler::new("webm");
    let session_id = assembler.session_id().to_string();
    info!(target: "sakina::ws", "audio session {} connected", session_id);

    while let Some(Ok(msg)) = socket.next().await {
        match msg {
            Message::Binary(bytes) => {
                if let Err(e) = assembler.push_frame(&bytes) {
                    warn!(target: "sakina::ws", "audio session {}: frame rejected: {}", session_id, e);
                    break;
                }
                // Advisory only; real recognition happens after the stream ends.
                let advisory =
                    serde_json::json!({"partial_transcript": "Processing your speech..."});
                if socket
                    .send(Message::Text(advisory.to_string()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Message::Text(text) => match parse_control(&text) {
                Some(StreamControl::End) => {
                    let terminal = run_stream_turn(&state, &session_id, &mut assembler).await;
                    let _ = socket.send(Message::Text(terminal.to_string())).await;
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
                None => {
                    // Unknown control frames are ignored; the stream stays open.
                    warn!(target: "sakina::ws", "audio session {}: unrecognized control frame", session_id);
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    assembler.close();
    info!(target: "sakina::ws", "audio session {} closed", session_id);
}

async fn run_stream_turn(
    state: &AppState,
    session_id: &str,
    assembler: &mut AudioStreamAssembler,
) -> serde_json::Value {
    let utterance = match assembler.finish() {
        Ok(utterance) => utterance,
        Err(e) => return serde_json::json!({"error": e.to_string()}),
    };
    match state.pipeline.run_turn(session_id, utterance).await {
        Ok(turn) => serde_json::json!({
            "final_transcript": turn.transcript,
            "response": turn.response_text,
            "tts_audio_url": turn.audio_url,
        }),
        Err(e) => {
            warn!(target: "sakina::ws", "audio session {}: turn failed: {}", session_id, e);
            serde_json::json!({"error": e.to_string()})
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::placeholder_state;
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Socket double: replays a fixed incoming script and records everything
    /// the handler sends.
    struct ScriptedSocket {
        incoming: VecDeque<Message>,
        sent: Vec<Message>,
    }

    impl ScriptedSocket {
        fn new(incoming: Vec<Message>) -> Self {
            Self {
                incoming: incoming.into(),
                sent: Vec::new(),
            }
        }
    }

    impl Stream for ScriptedSocket {
        type Item = Result<Message, axum::Error>;

        fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            Poll::Ready(self.incoming.pop_front().map(Ok))
        }
    }

    impl Sink<Message> for ScriptedSocket {
        type Error = axum::Error;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(mut self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
            self.sent.push(item);
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
    }

    fn sent_json(msg: &Message) -> serde_json::Value {
        let Message::Text(text) = msg else {
            panic!("expected text frame, got {msg:?}");
        };
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn chat_loop_survives_invalid_json_and_answers_the_next_frame() {
        let media = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let state = placeholder_state(media.path(), work.path(), "false", "");

        let mut socket = ScriptedSocket::new(vec![
            Message::Text("not json".to_string()),
            Message::Text(r#"{"message": "كيف حالك"}"#.to_string()),
        ]);
        drive_chat(&mut socket, state).await;

        assert_eq!(socket.sent.len(), 2);
        assert_eq!(sent_json(&socket.sent[0])["error"], "Invalid JSON format");
        let reply = sent_json(&socket.sent[1]);
        assert_eq!(reply["transcript"], "كيف حالك");
        assert_eq!(reply["response"], "رد تجريبي");
        assert!(reply["tts_audio_url"].is_string());
    }

    #[tokio::test]
    async fn audio_loop_sends_one_terminal_frame_then_closes() {
        let media = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let state = placeholder_state(media.path(), work.path(), "true", "مرحبا");

        let mut socket = ScriptedSocket::new(vec![
            Message::Binary(b"b1".to_vec()),
            Message::Binary(b"b2".to_vec()),
            Message::Text(r#"{"event": "end"}"#.to_string()),
            // Never reaches the handler: the loop exits after the terminal frame.
            Message::Binary(b"b3".to_vec()),
        ]);
        drive_audio(&mut socket, state).await;

        assert_eq!(socket.sent.len(), 4);
        assert_eq!(
            sent_json(&socket.sent[0])["partial_transcript"],
            "Processing your speech..."
        );
        assert_eq!(
            sent_json(&socket.sent[1])["partial_transcript"],
            "Processing your speech..."
        );
        let terminal = sent_json(&socket.sent[2]);
        assert_eq!(terminal["final_transcript"], "مرحبا");
        assert_eq!(terminal["response"], "رد تجريبي");
        assert!(terminal["tts_audio_url"].is_string());
        assert!(matches!(socket.sent[3], Message::Close(_)));
        // The post-end binary frame was never consumed.
        assert_eq!(socket.incoming.len(), 1);
    }

    #[tokio::test]
    async fn audio_loop_ignores_unknown_control_frames() {
        let media = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let state = placeholder_state(media.path(), work.path(), "true", "مرحبا");

        let mut socket = ScriptedSocket::new(vec![
            Message::Binary(b"b1".to_vec()),
            Message::Text(r#"{"event": "stop"}"#.to_string()),
            Message::Text(r#"{"event": "end"}"#.to_string()),
        ]);
        drive_audio(&mut socket, state).await;

        // One advisory, one terminal, one close; the unknown control frame
        // produced no output and no state change.
        assert_eq!(socket.sent.len(), 3);
        assert_eq!(sent_json(&socket.sent[1])["final_transcript"], "مرحبا");
        assert!(matches!(socket.sent[2], Message::Close(_)));
    }

    #[tokio::test]
    async fn audio_loop_reports_an_empty_stream_as_an_error_frame() {
        let media = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let state = placeholder_state(media.path(), work.path(), "true", "مرحبا");

        let mut socket =
            ScriptedSocket::new(vec![Message::Text(r#"{"event": "end"}"#.to_string())]);
        drive_audio(&mut socket, state).await;

        assert_eq!(socket.sent.len(), 2);
        assert!(sent_json(&socket.sent[0])["error"].is_string());
        assert!(matches!(socket.sent[1], Message::Close(_)));
    }
}
