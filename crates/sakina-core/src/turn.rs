//! Data model for one conversational turn.
//!
//! An [`Utterance`] enters the pipeline, a [`TurnResult`] leaves it, and a
//! [`TurnRecord`] is handed to the conversation logger on every terminal
//! path. All of these are owned by the turn that produced them and never
//! shared across turns or sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw user input for a single turn. Consumed exactly once.
#[derive(Debug, Clone)]
pub enum Utterance {
    /// Audio bytes in whatever container the client sent, plus the container
    /// extension ("webm", "ogg", "wav", ...) used for normalization.
    Audio { bytes: Vec<u8>, container: String },
    /// Already-typed text; the transcription stage is skipped.
    Text(String),
}

/// Categorical intent/emotion pair extracted from a transcript.
///
/// Both vocabularies are open (the model decides); `"unknown"` is the
/// explicit fallback when extraction fails or the reply is unparsable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentEmotion {
    pub intent: String,
    pub emotion: String,
}

impl IntentEmotion {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn new(intent: impl Into<String>, emotion: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            emotion: emotion.into(),
        }
    }

    /// The extraction-failure fallback: `("unknown", "unknown")`.
    pub fn unknown() -> Self {
        Self::new(Self::UNKNOWN, Self::UNKNOWN)
    }
}

/// Terminal output of one completed turn.
///
/// On an escalated turn `response_text` carries the fixed safety message and
/// the generator is never consulted. An empty `audio_url` means "no audio
/// available" and is a valid terminal state, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct TurnResult {
    pub transcript: String,
    pub response_text: String,
    pub audio_url: String,
    pub escalated: bool,
}

/// Row appended to the conversation log after every terminal turn,
/// escalated or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub session_id: String,
    pub transcript: String,
    pub response_text: String,
    pub intent: String,
    pub emotion: String,
    pub escalated: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_pair_is_the_documented_fallback() {
        let pair = IntentEmotion::unknown();
        assert_eq!(pair.intent, "unknown");
        assert_eq!(pair.emotion, "unknown");
    }
}
