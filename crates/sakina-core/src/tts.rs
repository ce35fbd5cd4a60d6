//! **Text-to-Speech (TTS)** — synthesize the reply and stage it for delivery.
//!
//! [`TtsBackend`] produces encoded audio bytes; the [`Synthesizer`] wrapper
//! stores them under the media directory and hands back a serving path, so
//! synthesis stays decoupled from the delivery transport. Synthesis never
//! fails a turn: every failure collapses to an empty URL.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{SakinaError, SakinaResult};

/// Backend that turns text into encoded audio bytes (MP3). Return an empty
/// vec to skip audio for this turn.
#[async_trait]
pub trait TtsBackend: Send + Sync {
    async fn synthesize(&self, text: &str) -> SakinaResult<Vec<u8>>;
}

/// Placeholder TTS: returns empty audio, so turns complete text-only.
#[derive(Debug, Default)]
pub struct PlaceholderTts;

#[async_trait]
impl TtsBackend for PlaceholderTts {
    async fn synthesize(&self, _text: &str) -> SakinaResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Production TTS backend: Azure Cognitive Services synthesis endpoint with
/// an Arabic neural voice, 16 kHz mono MP3 output.
#[derive(Debug, Clone)]
pub struct AzureTts {
    pub region: String,
    pub key: String,
    /// Synthesis language, e.g. "ar-SA".
    pub language: String,
    /// Neural voice name, e.g. "ar-SA-HamedNeural".
    pub voice: String,
    client: reqwest::Client,
}

impl AzureTts {
    /// Build from environment: AZURE_SPEECH_KEY, AZURE_SERVICE_REGION, SAKINA_TTS_LANGUAGE, SAKINA_TTS_VOICE.
    pub fn from_env() -> SakinaResult<Self> {
        let key = std::env::var("AZURE_SPEECH_KEY")
            .map_err(|_| SakinaError::Config("TTS requires AZURE_SPEECH_KEY".to_string()))?;
        let region = std::env::var("AZURE_SERVICE_REGION")
            .map_err(|_| SakinaError::Config("TTS requires AZURE_SERVICE_REGION".to_string()))?;
        let language = std::env::var("SAKINA_TTS_LANGUAGE").unwrap_or_else(|_| "ar-SA".to_string());
        let voice = std::env::var("SAKINA_TTS_VOICE").unwrap_or_else(|_| "ar-SA-HamedNeural".to_string());
        Self::new(region, key, language, voice)
    }

    pub fn new(
        region: impl Into<String>,
        key: impl Into<String>,
        language: impl Into<String>,
        voice: impl Into<String>,
    ) -> SakinaResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SakinaError::Synthesis(e.to_string()))?;
        Ok(Self {
            region: region.into(),
            key: key.into(),
            language: language.into(),
            voice: voice.into(),
            client,
        })
    }
}

#[async_trait]
impl TtsBackend for AzureTts {
    async fn synthesize(&self, text: &str) -> SakinaResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("https://{}.tts.speech.microsoft.com/cognitiveservices/v1", self.region);
        let ssml = format!(
            "<speak version='1.0' xml:lang='{lang}'><voice xml:lang='{lang}' name='{voice}'>{text}</voice></speak>",
            lang = self.language,
            voice = self.voice,
            text = xml_escape(text),
        );
        let res = self
            .client
            .post(&url)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", "audio-16khz-32kbitrate-mono-mp3")
            .body(ssml)
            .send()
            .await
            .map_err(|e| SakinaError::Synthesis(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SakinaError::Synthesis(format!("TTS API error {}: {}", status, body)));
        }
        let bytes = res.bytes().await.map_err(|e| SakinaError::Synthesis(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Create the best available TTS backend from environment: Azure when
/// credentials are present, otherwise the placeholder (text-only turns).
pub fn create_best_tts() -> Arc<dyn TtsBackend> {
    match AzureTts::from_env() {
        Ok(azure) => Arc::new(azure),
        Err(_) => Arc::new(PlaceholderTts),
    }
}

/// Stores synthesized audio under the media directory and returns serving
/// paths (`/api/audio/<uuid>.mp3`).
pub struct Synthesizer {
    backend: Arc<dyn TtsBackend>,
    media_dir: PathBuf,
    public_base: String,
}

impl Synthesizer {
    pub fn new(backend: Arc<dyn TtsBackend>, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            media_dir: media_dir.into(),
            public_base: "/api/audio".to_string(),
        }
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Synthesize `text`, store the audio, and return its serving URL.
    /// Any failure (missing credentials, provider error, write error)
    /// returns an empty string — the turn completes text-only.
    pub async fn synthesize_to_url(&self, text: &str) -> String {
        let bytes = match self.backend.synthesize(text).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(target: "sakina::tts", "synthesis failed: {}, continuing without audio", e);
                return String::new();
            }
        };
        if bytes.is_empty() {
            return String::new();
        }
        let filename = format!("{}.mp3", Uuid::new_v4());
        let path = self.media_dir.join(&filename);
        if let Err(e) = tokio::fs::create_dir_all(&self.media_dir).await {
            warn!(target: "sakina::tts", "media dir unavailable: {}, dropping audio", e);
            return String::new();
        }
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            warn!(target: "sakina::tts", "audio write failed: {}, dropping audio", e);
            return String::new();
        }
        info!(target: "sakina::tts", "stored {} bytes at {}", bytes.len(), path.display());
        format!("{}/{}", self.public_base, filename)
    }
}
