//! Therapeutic response generation.
//!
//! Two strategies behind one type, selected at deployment time:
//!
//! - **Fast**: a single short-prompt completion with a hard request timeout,
//!   tuned for interactive latency.
//! - **DualModel**: the primary drafts a reply under the extended
//!   cultural/clinical prompt, then an independent validator model reviews
//!   the draft once and may override it. One validation pass, no iteration.
//!
//! `generate` never raises: every failure path lands on the fixed Arabic
//! apology string.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::completion::{CompletionBackend, CompletionRequest};

/// Fallback reply used when every provider attempt fails.
pub const FALLBACK_REPLY: &str = "أعتذر، حدث خطأ تقني. هل يمكنك إعادة المحاولة؟";

/// Deployment-time response strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStrategy {
    Fast,
    DualModel,
}

impl ResponseStrategy {
    /// Parse `SAKINA_RESPONSE_STRATEGY` ("fast" | "dual"); unset or
    /// unrecognized values select fast mode.
    pub fn from_env() -> Self {
        match std::env::var("SAKINA_RESPONSE_STRATEGY") {
            Ok(v) if v.eq_ignore_ascii_case("dual") => ResponseStrategy::DualModel,
            _ => ResponseStrategy::Fast,
        }
    }
}

/// Extended system prompt for dual-model mode: Omani dialect, Gulf
/// mental-health terminology, Islamic/family values, CBT framing, crisis
/// protocol awareness, with the analyzed intent/emotion attached.
fn cultural_clinical_prompt(text: &str, intent: &str, emotion: &str) -> String {
    format!(
        "أنت معالج نفسي عماني محترف. تحدث باللهجة العمانية وراعِ القيم الإسلامية. \
         استخدم مصطلحات الصحة النفسية الخليجية، وادعم المزج بين العربية والإنجليزية إذا استخدمها المستخدم. \
         راعِ القيم الأسرية والدينية، وادعم المستخدم بتقنيات العلاج المعرفي السلوكي (CBT) عند الحاجة. \
         إذا كان هناك أزمة أو خطر، فعّل بروتوكول التصعيد وقدم دعمًا عاجلاً. \
         نية المستخدم: {intent}\nشعور المستخدم: {emotion}\nالنص: {text}"
    )
}

pub struct ResponseGenerator {
    strategy: ResponseStrategy,
    primary: Arc<dyn CompletionBackend>,
    validator: Option<Arc<dyn CompletionBackend>>,
    fast_timeout: Duration,
}

impl ResponseGenerator {
    /// `validator` is only consulted in dual-model mode; pass `None` for
    /// fast deployments.
    pub fn new(
        strategy: ResponseStrategy,
        primary: Arc<dyn CompletionBackend>,
        validator: Option<Arc<dyn CompletionBackend>>,
    ) -> Self {
        Self {
            strategy,
            primary,
            validator,
            fast_timeout: Duration::from_secs(10),
        }
    }

    /// Override the fast-mode request timeout (default 10 s).
    pub fn with_fast_timeout(mut self, timeout: Duration) -> Self {
        self.fast_timeout = timeout;
        self
    }

    /// Produce the reply text. Never raises; on failure the fixed fallback
    /// string is returned.
    pub async fn generate(&self, text: &str, intent: &str, emotion: &str) -> String {
        match self.strategy {
            ResponseStrategy::Fast => self.fast_reply(text, intent, emotion).await,
            ResponseStrategy::DualModel => self.dual_reply(text, intent, emotion).await,
        }
    }

    async fn fast_reply(&self, text: &str, intent: &str, emotion: &str) -> String {
        let system = format!(
            "أنت معالج نفسي عماني. تحدث باللهجة العمانية بشكل طبيعي ومريح. \
             قدم ردود قصيرة ومفيدة (50-100 كلمة). راعِ القيم الإسلامية والثقافة العمانية. \
             المشاعر: {emotion}، النية: {intent}"
        );
        let request = CompletionRequest {
            system,
            user: text.to_string(),
            temperature: 0.8,
            max_tokens: 150,
            timeout: Some(self.fast_timeout),
        };
        match self.primary.complete(&request).await {
            Ok(reply) if !reply.trim().is_empty() => {
                info!(target: "sakina::generation", "fast reply generated ({} chars)", reply.trim().len());
                reply.trim().to_string()
            }
            Ok(_) => {
                warn!(target: "sakina::generation", "fast reply was empty, using fallback");
                FALLBACK_REPLY.to_string()
            }
            Err(e) => {
                warn!(target: "sakina::generation", "fast reply failed: {}, using fallback", e);
                FALLBACK_REPLY.to_string()
            }
        }
    }

    async fn dual_reply(&self, text: &str, intent: &str, emotion: &str) -> String {
        let system = cultural_clinical_prompt(text, intent, emotion);
        let draft_request = CompletionRequest {
            system: system.clone(),
            user: text.to_string(),
            temperature: 0.7,
            max_tokens: 512,
            timeout: None,
        };
        let draft = match self.primary.complete(&draft_request).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => return FALLBACK_REPLY.to_string(),
            Err(e) => {
                warn!(target: "sakina::generation", "primary draft failed: {}, using fallback", e);
                return FALLBACK_REPLY.to_string();
            }
        };

        let Some(validator) = &self.validator else {
            return draft;
        };

        // One review pass: same framing plus the draft and a correction
        // instruction. The validator's answer wins only when it is non-empty
        // and actually different from the draft.
        let review_request = CompletionRequest {
            system,
            user: format!(
                "{text}\nرد النموذج الأول: {draft}\n\
                 قيم الرد من حيث الدقة العلاجية والثقافية، وصححه إذا لزم الأمر. أجب بالرد النهائي المناسب للمستخدم."
            ),
            temperature: 0.7,
            max_tokens: 512,
            timeout: None,
        };
        match validator.complete(&review_request).await {
            Ok(review) => {
                let review = review.trim();
                if !review.is_empty() && review != draft {
                    info!(target: "sakina::generation", "validator overrode the draft");
                    review.to_string()
                } else {
                    draft
                }
            }
            Err(e) => {
                warn!(target: "sakina::generation", "validator failed: {}, keeping draft", e);
                draft
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::PlaceholderCompletion;

    fn generator(
        strategy: ResponseStrategy,
        primary: PlaceholderCompletion,
        validator: Option<PlaceholderCompletion>,
    ) -> ResponseGenerator {
        ResponseGenerator::new(
            strategy,
            Arc::new(primary),
            validator.map(|v| Arc::new(v) as Arc<dyn CompletionBackend>),
        )
    }

    #[tokio::test]
    async fn fast_mode_returns_trimmed_reply() {
        let g = generator(
            ResponseStrategy::Fast,
            PlaceholderCompletion::with_response("  رد مفيد  "),
            None,
        );
        assert_eq!(g.generate("نص", "استشارة", "قلق").await, "رد مفيد");
    }

    #[tokio::test]
    async fn fast_mode_falls_back_on_provider_error() {
        let g = generator(ResponseStrategy::Fast, PlaceholderCompletion::failing(), None);
        assert_eq!(g.generate("نص", "استشارة", "قلق").await, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn dual_mode_prefers_a_differing_validator_reply() {
        let g = generator(
            ResponseStrategy::DualModel,
            PlaceholderCompletion::with_response("مسودة"),
            Some(PlaceholderCompletion::with_response("رد مصحح")),
        );
        assert_eq!(g.generate("نص", "دعم", "حزن").await, "رد مصحح");
    }

    #[tokio::test]
    async fn dual_mode_keeps_draft_when_validator_agrees() {
        let g = generator(
            ResponseStrategy::DualModel,
            PlaceholderCompletion::with_response("مسودة"),
            Some(PlaceholderCompletion::with_response("  مسودة  ")),
        );
        assert_eq!(g.generate("نص", "دعم", "حزن").await, "مسودة");
    }

    #[tokio::test]
    async fn dual_mode_keeps_draft_when_validator_is_empty_or_failing() {
        let g = generator(
            ResponseStrategy::DualModel,
            PlaceholderCompletion::with_response("مسودة"),
            Some(PlaceholderCompletion::with_response("   ")),
        );
        assert_eq!(g.generate("نص", "دعم", "حزن").await, "مسودة");

        let g = generator(
            ResponseStrategy::DualModel,
            PlaceholderCompletion::with_response("مسودة"),
            Some(PlaceholderCompletion::failing()),
        );
        assert_eq!(g.generate("نص", "دعم", "حزن").await, "مسودة");
    }

    #[tokio::test]
    async fn dual_mode_falls_back_when_primary_fails() {
        let validator = PlaceholderCompletion::with_response("رد");
        let g = generator(
            ResponseStrategy::DualModel,
            PlaceholderCompletion::failing(),
            Some(validator),
        );
        assert_eq!(g.generate("نص", "دعم", "حزن").await, FALLBACK_REPLY);
    }
}
