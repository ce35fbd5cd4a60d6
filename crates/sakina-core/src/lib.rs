//! # Sakina Core — Arabic mental-health turn pipeline
//!
//! This crate implements the conversational core of Sakina: transcribe an
//! utterance, extract intent/emotion, evaluate escalation risk, generate a
//! culturally adapted therapeutic reply, synthesize it as speech, and record
//! the turn — plus the chunked-audio ingestion protocol used by the
//! real-time WebSocket channel.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                         Turn Pipeline                          │
//! │  ┌──────────┐  ┌───────────┐  ┌─────────┐  ┌────────────┐     │
//! │  │ Convert  │→ │ Transcribe│→ │ Analyze │→ │ Safety gate │     │
//! │  │ (ffmpeg) │  │  (STT)    │  │  (LLM)  │  │ (keywords)  │     │
//! │  └──────────┘  └───────────┘  └─────────┘  └──────┬─────┘     │
//! │                        escalated? ──────────────┐  │           │
//! │  ┌──────────┐  ┌───────────┐  ┌──────────────┐  │  │           │
//! │  │  Record  │← │ Synthesize│← │   Generate   │←─┴──┘           │
//! │  │  (log)   │  │   (TTS)   │  │ (fast/dual)  │                 │
//! │  └──────────┘  └───────────┘  └──────────────┘                 │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Vendor services sit behind capability traits ([`CompletionBackend`],
//! [`SttBackend`], [`TtsBackend`], [`ConversationLogger`]); each ships a
//! `Placeholder*` implementation so the pipeline runs without credentials.

pub mod analysis;
pub mod completion;
pub mod config;
pub mod convert;
pub mod error;
pub mod generation;
pub mod log;
pub mod pipeline;
pub mod safety;
pub mod stream;
pub mod stt;
pub mod tts;
pub mod turn;

pub use analysis::IntentEmotionExtractor;
pub use completion::{
    AnthropicCompletion, CompletionBackend, CompletionRequest, OpenAiCompletion,
    PlaceholderCompletion,
};
pub use config::PipelineConfig;
pub use convert::AudioConverter;
pub use error::{SakinaError, SakinaResult};
pub use generation::{ResponseGenerator, ResponseStrategy, FALLBACK_REPLY};
pub use log::{ConversationLogger, MemoryLogger};
pub use pipeline::TurnPipeline;
pub use safety::{SafetyEvaluator, SafetyRules, SafetyVerdict};
pub use stream::{parse_control, AudioStreamAssembler, StreamControl, StreamState};
pub use stt::{create_best_stt, AzureStt, PlaceholderStt, SttBackend};
pub use tts::{create_best_tts, AzureTts, PlaceholderTts, Synthesizer, TtsBackend};
pub use turn::{IntentEmotion, TurnRecord, TurnResult, Utterance};
