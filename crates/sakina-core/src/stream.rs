//! Streaming audio ingestion for the real-time WebSocket channel.
//!
//! One [`AudioStreamAssembler`] per connection accumulates binary frames in
//! receipt order until the client's `{"event":"end"}` control frame, then
//! yields the whole buffer as an audio [`Utterance`] for the pipeline.
//! Malformed control frames are ignored without a state transition. Every
//! path into `Closed` — terminal frame delivered, error reported, or abrupt
//! disconnect — releases the buffer.

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{SakinaError, SakinaResult};
use crate::turn::Utterance;

/// Control frames accepted on the streaming channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamControl {
    /// `{"event":"end"}` — end of utterance, run the pipeline.
    End,
}

/// Parse a text frame as a control message. Invalid JSON and unknown events
/// return `None`; the caller logs and ignores them.
pub fn parse_control(text: &str) -> Option<StreamControl> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    match value.get("event").and_then(|e| e.as_str()) {
        Some("end") => Some(StreamControl::End),
        _ => None,
    }
}

/// Lifecycle of one streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Connection accepted, no audio yet.
    Open,
    /// At least one binary frame received.
    Accumulating,
    /// End signal seen; buffer consumed by the pipeline.
    Finalized,
    /// All session resources released.
    Closed,
}

/// Single-writer accumulator for one connection's chunked audio.
pub struct AudioStreamAssembler {
    session_id: String,
    container: String,
    buffer: Vec<u8>,
    frames: usize,
    state: StreamState,
}

impl AudioStreamAssembler {
    /// `container` is the extension the client's frames are encoded in
    /// (browser MediaRecorder sends "webm").
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            container: container.into(),
            buffer: Vec::new(),
            frames: 0,
            state: StreamState::Open,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Append one binary frame, in receipt order.
    pub fn push_frame(&mut self, bytes: &[u8]) -> SakinaResult<()> {
        match self.state {
            StreamState::Open | StreamState::Accumulating => {
                self.state = StreamState::Accumulating;
                self.buffer.extend_from_slice(bytes);
                self.frames += 1;
                debug!(
                    target: "sakina::stream",
                    "session {}: frame {} ({} bytes, {} total)",
                    self.session_id, self.frames, bytes.len(), self.buffer.len()
                );
                Ok(())
            }
            _ => Err(SakinaError::Input("binary frame after end of stream".to_string())),
        }
    }

    /// Consume the accumulated buffer as an audio utterance. Errors if the
    /// stream was already finalized or never carried any audio.
    pub fn finish(&mut self) -> SakinaResult<Utterance> {
        match self.state {
            StreamState::Open | StreamState::Accumulating => {}
            _ => return Err(SakinaError::Input("stream already finalized".to_string())),
        }
        self.state = StreamState::Finalized;
        if self.buffer.is_empty() {
            return Err(SakinaError::Input("end of stream with no audio frames".to_string()));
        }
        let bytes = std::mem::take(&mut self.buffer);
        info!(
            target: "sakina::stream",
            "session {}: finalized {} frames ({} bytes)",
            self.session_id, self.frames, bytes.len()
        );
        Ok(Utterance::Audio {
            bytes,
            container: self.container.clone(),
        })
    }

    /// Release all session resources. Idempotent; safe on every path,
    /// including abrupt disconnect mid-accumulation.
    pub fn close(&mut self) {
        self.buffer = Vec::new();
        self.state = StreamState::Closed;
    }
}

impl Drop for AudioStreamAssembler {
    fn drop(&mut self) {
        if self.state != StreamState::Closed {
            debug!(target: "sakina::stream", "session {}: dropped before close, releasing buffer", self.session_id);
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_concatenate_in_receipt_order() {
        let mut assembler = AudioStreamAssembler::new("webm");
        assembler.push_frame(b"b1").unwrap();
        assembler.push_frame(b"b2").unwrap();
        assembler.push_frame(b"b3").unwrap();
        assert_eq!(assembler.frames(), 3);
        let Utterance::Audio { bytes, container } = assembler.finish().unwrap() else {
            panic!("expected audio utterance");
        };
        assert_eq!(bytes, b"b1b2b3");
        assert_eq!(container, "webm");
        assert_eq!(assembler.state(), StreamState::Finalized);
    }

    #[test]
    fn malformed_control_frames_are_ignored() {
        assert_eq!(parse_control(r#"{"event":"end"}"#), Some(StreamControl::End));
        assert_eq!(parse_control("not json"), None);
        assert_eq!(parse_control(r#"{"event":"stop"}"#), None);
        assert_eq!(parse_control(r#"{"other":"end"}"#), None);
    }

    #[test]
    fn finish_without_audio_is_an_input_error() {
        let mut assembler = AudioStreamAssembler::new("webm");
        assert!(matches!(assembler.finish(), Err(SakinaError::Input(_))));
    }

    #[test]
    fn no_frames_after_finalize() {
        let mut assembler = AudioStreamAssembler::new("webm");
        assembler.push_frame(b"x").unwrap();
        assembler.finish().unwrap();
        assert!(assembler.push_frame(b"y").is_err());
        assert!(assembler.finish().is_err());
    }

    #[test]
    fn close_releases_the_buffer_on_disconnect() {
        let mut assembler = AudioStreamAssembler::new("webm");
        assembler.push_frame(&[0u8; 4096]).unwrap();
        assert_eq!(assembler.buffered(), 4096);
        assembler.close();
        assert_eq!(assembler.buffered(), 0);
        assert_eq!(assembler.state(), StreamState::Closed);
    }
}
