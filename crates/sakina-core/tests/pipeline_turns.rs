//! End-to-end turn pipeline tests with placeholder capability backends.

use std::sync::Arc;

use async_trait::async_trait;
use sakina_core::{
    AudioConverter, AudioStreamAssembler, CompletionBackend, ConversationLogger,
    IntentEmotionExtractor, MemoryLogger, PlaceholderCompletion, PlaceholderStt, PlaceholderTts,
    ResponseGenerator, ResponseStrategy, SafetyEvaluator, SafetyRules, SakinaError, SakinaResult,
    SttBackend, Synthesizer, TtsBackend, TurnPipeline, Utterance,
};

struct Fixture {
    pipeline: TurnPipeline,
    generator_backend: Arc<PlaceholderCompletion>,
    stt: Arc<PlaceholderStt>,
    logger: Arc<MemoryLogger>,
    _dirs: (tempfile::TempDir, tempfile::TempDir),
}

/// TTS backend standing in for a provider with missing credentials.
struct UnavailableTts;

#[async_trait]
impl TtsBackend for UnavailableTts {
    async fn synthesize(&self, _text: &str) -> SakinaResult<Vec<u8>> {
        Err(SakinaError::Synthesis("credentials not configured".to_string()))
    }
}

/// Pipeline wired to placeholders: the analysis backend returns a canned
/// intent/emotion pair, the generator backend a canned reply, and the
/// converter binary always fails (audio turns are only used to prove the
/// conversion-failure path).
fn fixture(analysis_json: &str, reply: &str, tts: Arc<dyn TtsBackend>) -> Fixture {
    let media_dir = tempfile::tempdir().unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    let analysis_backend = Arc::new(PlaceholderCompletion::with_response(analysis_json));
    let generator_backend = Arc::new(PlaceholderCompletion::with_response(reply));
    let stt = Arc::new(PlaceholderStt::with_response("نص منطوق"));
    let logger = Arc::new(MemoryLogger::new());
    let generator: Arc<dyn CompletionBackend> = Arc::clone(&generator_backend) as Arc<dyn CompletionBackend>;
    let pipeline = TurnPipeline::new(
        SafetyEvaluator::new(SafetyRules::default()),
        IntentEmotionExtractor::new(analysis_backend),
        ResponseGenerator::new(ResponseStrategy::Fast, generator, None),
        Arc::clone(&stt) as Arc<dyn SttBackend>,
        Synthesizer::new(tts, media_dir.path()),
        AudioConverter::new(work_dir.path()).with_binary("false"),
        Arc::clone(&logger) as Arc<dyn ConversationLogger>,
    );
    Fixture {
        pipeline,
        generator_backend,
        stt,
        logger,
        _dirs: (media_dir, work_dir),
    }
}

const CALM_ANALYSIS: &str = "{\"intent\": \"استشارة\", \"emotion\": \"أمل\"}";

#[tokio::test]
async fn referral_keyword_escalates_and_skips_the_generator() {
    let f = fixture(CALM_ANALYSIS, "رد علاجي", Arc::new(PlaceholderTts));
    let result = f
        .pipeline
        .run_turn("s1", Utterance::Text("أحتاج طبيب نفسي".to_string()))
        .await
        .unwrap();

    let referral = SafetyRules::default().referral_message;
    assert!(result.escalated);
    assert_eq!(result.response_text, referral);
    assert!(!result.response_text.is_empty());
    // Escalation is a true short-circuit: no generation call happened.
    assert_eq!(f.generator_backend.calls(), 0);

    let records = f.logger.records().await;
    assert_eq!(records.len(), 1);
    assert!(records[0].escalated);
    assert_eq!(records[0].response_text, referral);
}

#[tokio::test]
async fn crisis_keyword_wins_regardless_of_calm_analysis() {
    let f = fixture(CALM_ANALYSIS, "رد علاجي", Arc::new(PlaceholderTts));
    let result = f
        .pipeline
        .run_turn("s1", Utterance::Text("أفكر في الانتحار".to_string()))
        .await
        .unwrap();
    assert!(result.escalated);
    assert_eq!(result.response_text, SafetyRules::default().crisis_message);
    assert_eq!(f.generator_backend.calls(), 0);
}

#[tokio::test]
async fn clean_turn_generates_a_reply() {
    let f = fixture(CALM_ANALYSIS, "خذ نفساً عميقاً وتوكل على الله", Arc::new(PlaceholderTts));
    let result = f
        .pipeline
        .run_turn("s2", Utterance::Text("كيف أتعامل مع ضغوط العمل؟".to_string()))
        .await
        .unwrap();

    assert!(!result.escalated);
    assert_eq!(result.response_text, "خذ نفساً عميقاً وتوكل على الله");
    assert_eq!(f.generator_backend.calls(), 1);

    let records = f.logger.records().await;
    assert_eq!(records.len(), 1);
    assert!(!records[0].escalated);
    assert_eq!(records[0].intent, "استشارة");
    assert_eq!(records[0].emotion, "أمل");
}

#[tokio::test]
async fn synthesis_failure_degrades_to_text_only() {
    let f = fixture(CALM_ANALYSIS, "رد علاجي", Arc::new(UnavailableTts));
    let result = f
        .pipeline
        .run_turn("s3", Utterance::Text("كيف حالك".to_string()))
        .await
        .unwrap();

    assert!(!result.response_text.is_empty());
    assert_eq!(result.audio_url, "");
    assert!(!result.escalated);
    // The turn was still recorded.
    assert_eq!(f.logger.records().await.len(), 1);
}

#[tokio::test]
async fn conversion_failure_aborts_before_transcription() {
    let f = fixture(CALM_ANALYSIS, "رد علاجي", Arc::new(PlaceholderTts));
    let err = f
        .pipeline
        .run_turn(
            "s4",
            Utterance::Audio {
                bytes: vec![1, 2, 3],
                container: "webm".to_string(),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SakinaError::Conversion(_)), "got {err:?}");
    assert_eq!(err.stage(), "conversion");
    // The STT backend was never consulted.
    assert_eq!(f.stt.calls(), 0);
    // Nothing reached the log: the turn failed before any terminal state.
    assert!(f.logger.records().await.is_empty());
}

#[tokio::test]
async fn assembled_stream_feeds_the_pipeline_in_order() {
    let mut assembler = AudioStreamAssembler::new("webm");
    assembler.push_frame(b"b1").unwrap();
    assembler.push_frame(b"b2").unwrap();
    assembler.push_frame(b"b3").unwrap();
    let utterance = assembler.finish().unwrap();
    assembler.close();

    // The failing converter receives exactly the concatenated bytes.
    let Utterance::Audio { ref bytes, .. } = utterance else {
        panic!("expected audio");
    };
    assert_eq!(bytes, b"b1b2b3");

    let f = fixture(CALM_ANALYSIS, "رد", Arc::new(PlaceholderTts));
    let err = f.pipeline.run_turn("s5", utterance).await.unwrap_err();
    assert_eq!(err.stage(), "conversion");
}
