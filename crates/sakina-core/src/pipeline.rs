//! TurnPipeline — the orchestration layer for one conversational turn.
//!
//! Stage order is fixed: (audio only) normalize → transcribe, then extract
//! intent/emotion, then evaluate safety on the extraction's output, then the
//! escalation gate, then generation (non-escalated only), then synthesis,
//! then the conversation log. Conversion/transcription failures are fatal
//! to the turn; generation and synthesis degrade; logging only warns.
//!
//! One pipeline instance serves every connection: it holds no per-turn
//! state, so concurrent turns share nothing but the append-only log sink.

use std::sync::Arc;
use tracing::{info, warn};

use crate::analysis::IntentEmotionExtractor;
use crate::completion::{CompletionBackend, OpenAiCompletion, PlaceholderCompletion};
use crate::config::PipelineConfig;
use crate::convert::AudioConverter;
use crate::error::{SakinaError, SakinaResult};
use crate::generation::{ResponseGenerator, ResponseStrategy};
use crate::log::ConversationLogger;
use crate::safety::{SafetyEvaluator, SafetyRules};
use crate::stt::{create_best_stt, SttBackend};
use crate::tts::{create_best_tts, Synthesizer};
use crate::turn::{TurnRecord, TurnResult, Utterance};

pub struct TurnPipeline {
    evaluator: SafetyEvaluator,
    extractor: IntentEmotionExtractor,
    generator: ResponseGenerator,
    stt: Arc<dyn SttBackend>,
    synthesizer: Synthesizer,
    converter: AudioConverter,
    logger: Arc<dyn ConversationLogger>,
}

impl TurnPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        evaluator: SafetyEvaluator,
        extractor: IntentEmotionExtractor,
        generator: ResponseGenerator,
        stt: Arc<dyn SttBackend>,
        synthesizer: Synthesizer,
        converter: AudioConverter,
        logger: Arc<dyn ConversationLogger>,
    ) -> Self {
        Self {
            evaluator,
            extractor,
            generator,
            stt,
            synthesizer,
            converter,
            logger,
        }
    }

    /// Assemble a pipeline from environment-selected backends. Missing
    /// credentials degrade to placeholders (text-only, canned replies)
    /// rather than failing startup.
    pub fn from_env(config: &PipelineConfig, logger: Arc<dyn ConversationLogger>) -> Self {
        let primary: Arc<dyn CompletionBackend> = match OpenAiCompletion::from_env() {
            Ok(backend) => {
                // Dual mode drafts on the larger model unless pinned by env.
                if config.strategy == ResponseStrategy::DualModel
                    && std::env::var("SAKINA_LLM_MODEL").is_err()
                {
                    Arc::new(backend.with_model("gpt-4o"))
                } else {
                    Arc::new(backend)
                }
            }
            Err(e) => {
                warn!(target: "sakina::pipeline", "completion backend unavailable: {}, using placeholder", e);
                Arc::new(PlaceholderCompletion::new())
            }
        };
        let validator: Option<Arc<dyn CompletionBackend>> =
            if config.strategy == ResponseStrategy::DualModel {
                match crate::completion::AnthropicCompletion::from_env() {
                    Ok(backend) => Some(Arc::new(backend)),
                    Err(e) => {
                        warn!(target: "sakina::pipeline", "validator unavailable: {}, dual mode runs unvalidated", e);
                        None
                    }
                }
            } else {
                None
            };
        let rules = match &config.safety_rules_path {
            Some(path) => SafetyRules::from_path(path).unwrap_or_else(|e| {
                warn!(target: "sakina::pipeline", "safety rules unreadable ({}), using built-in protocol", e);
                SafetyRules::default()
            }),
            None => SafetyRules::default(),
        };
        Self::new(
            SafetyEvaluator::new(rules),
            IntentEmotionExtractor::new(Arc::clone(&primary)),
            ResponseGenerator::new(config.strategy, primary, validator)
                .with_fast_timeout(config.fast_timeout),
            create_best_stt(),
            Synthesizer::new(create_best_tts(), &config.media_dir),
            AudioConverter::new(&config.work_dir),
            logger,
        )
    }

    /// Process one turn end to end. Fails with a stage-tagged error on
    /// conversion/transcription problems; generation and synthesis always
    /// degrade instead of failing. The turn is recorded on every terminal
    /// path, escalated or not.
    pub async fn run_turn(&self, session_id: &str, utterance: Utterance) -> SakinaResult<TurnResult> {
        let transcript = match utterance {
            Utterance::Text(text) => text,
            Utterance::Audio { bytes, container } => {
                self.transcribe_audio(&bytes, &container).await?
            }
        };

        // Extraction first, then safety on its output: the verdict depends
        // on the intent, so these stages are sequential by construction.
        let analysis = self.extractor.extract(&transcript).await;
        let verdict = self
            .evaluator
            .evaluate(&transcript, &analysis.intent, &analysis.emotion);

        let (response_text, escalated) = match verdict.message() {
            Some(message) => {
                info!(
                    target: "sakina::pipeline",
                    "session {}: escalation triggered (intent {}, emotion {})",
                    session_id, analysis.intent, analysis.emotion
                );
                (message.to_string(), true)
            }
            None => (
                self.generator
                    .generate(&transcript, &analysis.intent, &analysis.emotion)
                    .await,
                false,
            ),
        };

        let audio_url = self.synthesizer.synthesize_to_url(&response_text).await;

        let record = TurnRecord {
            session_id: session_id.to_string(),
            transcript: transcript.clone(),
            response_text: response_text.clone(),
            intent: analysis.intent,
            emotion: analysis.emotion,
            escalated,
            created_at: chrono::Utc::now(),
        };
        if let Err(e) = self.logger.append(&record).await {
            // The response is already on its way; losing the log row must
            // not surface as a turn failure.
            warn!(target: "sakina::pipeline", "session {}: log append failed: {}", session_id, e);
        }

        Ok(TurnResult {
            transcript,
            response_text,
            audio_url,
            escalated,
        })
    }

    async fn transcribe_audio(&self, bytes: &[u8], container: &str) -> SakinaResult<String> {
        if bytes.is_empty() {
            return Err(SakinaError::Input("empty audio payload".to_string()));
        }
        let wav = self.converter.normalize_bytes(bytes, container).await?;
        let transcript = self.stt.transcribe(&wav).await;
        // Scratch WAV is turn-local; remove it on both outcomes.
        let _ = tokio::fs::remove_file(&wav).await;
        transcript
    }
}
