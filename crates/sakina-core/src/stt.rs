//! **Speech-to-Text (STT)** — convert normalized WAV audio into a transcript.
//!
//! Implement [`SttBackend`] for a speech provider. Input is expected to be
//! mono 16 kHz PCM WAV; normalization is the caller's responsibility (see
//! [`crate::convert`]). "Nothing recognized" is an empty string, not an
//! error.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::error::{SakinaError, SakinaResult};

/// Backend for converting a normalized WAV file to text.
#[async_trait]
pub trait SttBackend: Send + Sync {
    /// Transcribe one turn's audio. Returns an empty string when the
    /// provider reports no recognized speech.
    async fn transcribe(&self, wav: &Path) -> SakinaResult<String>;
}

/// Placeholder STT: returns a preset transcript (or an empty string, the
/// "no speech" outcome) and counts invocations for pipeline tests.
#[derive(Debug, Default)]
pub struct PlaceholderStt {
    response: Option<String>,
    calls: AtomicUsize,
}

impl PlaceholderStt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SttBackend for PlaceholderStt {
    async fn transcribe(&self, _wav: &Path) -> SakinaResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone().unwrap_or_default())
    }
}

#[derive(Deserialize)]
struct RecognitionOutcome {
    #[serde(rename = "RecognitionStatus")]
    status: String,
    #[serde(rename = "DisplayText", default)]
    display_text: String,
}

/// Production STT backend: Azure Cognitive Services short-audio REST
/// endpoint, recognition language `ar-OM` by default.
#[derive(Debug, Clone)]
pub struct AzureStt {
    /// Azure region, e.g. "uaenorth".
    pub region: String,
    /// `Ocp-Apim-Subscription-Key` value.
    pub key: String,
    /// BCP-47 recognition language.
    pub language: String,
    client: reqwest::Client,
}

impl AzureStt {
    /// Build from environment: AZURE_SPEECH_KEY, AZURE_SERVICE_REGION, SAKINA_STT_LANGUAGE.
    pub fn from_env() -> SakinaResult<Self> {
        let key = std::env::var("AZURE_SPEECH_KEY")
            .map_err(|_| SakinaError::Config("STT requires AZURE_SPEECH_KEY".to_string()))?;
        let region = std::env::var("AZURE_SERVICE_REGION")
            .map_err(|_| SakinaError::Config("STT requires AZURE_SERVICE_REGION".to_string()))?;
        let language = std::env::var("SAKINA_STT_LANGUAGE").unwrap_or_else(|_| "ar-OM".to_string());
        Self::new(region, key, language)
    }

    /// Create with explicit config.
    pub fn new(
        region: impl Into<String>,
        key: impl Into<String>,
        language: impl Into<String>,
    ) -> SakinaResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SakinaError::Transcription(e.to_string()))?;
        Ok(Self {
            region: region.into(),
            key: key.into(),
            language: language.into(),
            client,
        })
    }
}

#[async_trait]
impl SttBackend for AzureStt {
    async fn transcribe(&self, wav: &Path) -> SakinaResult<String> {
        let bytes = tokio::fs::read(wav)
            .await
            .map_err(|e| SakinaError::Transcription(format!("read {}: {}", wav.display(), e)))?;
        if bytes.is_empty() {
            return Ok(String::new());
        }
        let url = format!(
            "https://{}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1?language={}&format=simple",
            self.region, self.language
        );
        let res = self
            .client
            .post(&url)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", "audio/wav; codecs=audio/pcm; samplerate=16000")
            .body(bytes)
            .send()
            .await
            .map_err(|e| SakinaError::Transcription(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SakinaError::Transcription(format!(
                "STT API error {}: {}",
                status, body
            )));
        }
        let outcome: RecognitionOutcome = res
            .json()
            .await
            .map_err(|e| SakinaError::Transcription(e.to_string()))?;
        if outcome.status == "Success" {
            Ok(outcome.display_text.trim().to_string())
        } else {
            // NoMatch, InitialSilenceTimeout, ... — no speech is not an error.
            debug!(target: "sakina::stt", "recognition status {}, returning empty transcript", outcome.status);
            Ok(String::new())
        }
    }
}

/// Create the best available STT backend from environment: Azure when
/// credentials are present, otherwise the placeholder.
pub fn create_best_stt() -> std::sync::Arc<dyn SttBackend> {
    match AzureStt::from_env() {
        Ok(azure) => std::sync::Arc::new(azure),
        Err(_) => std::sync::Arc::new(PlaceholderStt::new()),
    }
}
