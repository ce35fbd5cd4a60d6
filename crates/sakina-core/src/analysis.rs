//! Intent and emotion extraction from a transcript.
//!
//! A single low-temperature completion asks for a JSON pair
//! `{"intent", "emotion"}`. The provider's reply is treated as untrusted
//! prose: the first brace-delimited object is fished out and parsed, and any
//! failure along the way degrades to `("unknown", "unknown")` — extraction
//! never fails the turn.

use std::sync::Arc;
use tracing::warn;

use crate::completion::{CompletionBackend, CompletionRequest};
use crate::turn::IntentEmotion;

/// Fixed analyst instruction (Omani Arabic), answer requested as JSON only.
const ANALYST_PROMPT: &str = "أنت محلل نفسي عماني محترف. استخرج نية المستخدم (استشارة، أزمة، دعم، إلخ) واستخرج الشعور الأساسي (قلق، حزن، غضب، أمل، إلخ) من النص التالي. أجب فقط بصيغة JSON: {\"intent\": intent, \"emotion\": emotion}";

pub struct IntentEmotionExtractor {
    completion: Arc<dyn CompletionBackend>,
}

impl IntentEmotionExtractor {
    pub fn new(completion: Arc<dyn CompletionBackend>) -> Self {
        Self { completion }
    }

    /// Classify one transcript. Never raises; provider or parse failures
    /// return the unknown pair.
    pub async fn extract(&self, text: &str) -> IntentEmotion {
        let request = CompletionRequest {
            system: ANALYST_PROMPT.to_string(),
            user: text.to_string(),
            temperature: 0.2,
            max_tokens: 100,
            timeout: None,
        };
        match self.completion.complete(&request).await {
            Ok(raw) => parse_intent_emotion(&raw),
            Err(e) => {
                warn!(target: "sakina::analysis", "intent extraction failed: {}", e);
                IntentEmotion::unknown()
            }
        }
    }
}

/// Pull the first `{...}` object out of the raw reply (tolerant of
/// surrounding prose) and parse it; missing keys default to "unknown".
fn parse_intent_emotion(raw: &str) -> IntentEmotion {
    let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
        return IntentEmotion::unknown();
    };
    if end < start {
        return IntentEmotion::unknown();
    }
    match serde_json::from_str::<serde_json::Value>(&raw[start..=end]) {
        Ok(value) => IntentEmotion::new(
            value
                .get("intent")
                .and_then(|v| v.as_str())
                .unwrap_or(IntentEmotion::UNKNOWN),
            value
                .get("emotion")
                .and_then(|v| v.as_str())
                .unwrap_or(IntentEmotion::UNKNOWN),
        ),
        Err(_) => IntentEmotion::unknown(),
    }
}
