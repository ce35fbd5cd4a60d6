//! Safety evaluation: keyword/emotion escalation triggers.
//!
//! The evaluator is a pure function of `(text, intent, emotion)`. Matching is
//! **case-sensitive substring containment**, not tokenized matching — a
//! keyword inside a longer word still triggers. That imprecision is the
//! documented behavior of the escalation protocol; changing it to
//! word-boundary matching would change which turns escalate.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{SakinaError, SakinaResult};

/// Outcome of a safety evaluation. The constructors enforce the invariant
/// that a message is present if and only if the turn escalates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyVerdict {
    escalate: bool,
    message: Option<String>,
}

impl SafetyVerdict {
    /// No escalation trigger matched.
    pub fn clear() -> Self {
        Self {
            escalate: false,
            message: None,
        }
    }

    /// Escalate with the given fixed user-facing message.
    pub fn escalate(message: impl Into<String>) -> Self {
        Self {
            escalate: true,
            message: Some(message.into()),
        }
    }

    pub fn is_escalation(&self) -> bool {
        self.escalate
    }

    /// The fixed safety message; `Some` exactly when [`is_escalation`](Self::is_escalation).
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Keyword lists and fixed escalation messages.
///
/// These are configuration data, not logic: deployments edit them in a TOML
/// file (see [`SafetyRules::from_path`]) without touching the matcher. The
/// defaults carry the Omani Arabic protocol wording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyRules {
    #[serde(default = "default_crisis_keywords")]
    pub crisis_keywords: Vec<String>,
    #[serde(default = "default_violence_keywords")]
    pub violence_keywords: Vec<String>,
    #[serde(default = "default_referral_keywords")]
    pub referral_keywords: Vec<String>,
    #[serde(default = "default_severe_emotions")]
    pub severe_emotions: Vec<String>,
    #[serde(default = "default_crisis_message")]
    pub crisis_message: String,
    #[serde(default = "default_violence_message")]
    pub violence_message: String,
    #[serde(default = "default_referral_message")]
    pub referral_message: String,
    #[serde(default = "default_severe_emotion_message")]
    pub severe_emotion_message: String,
}

fn default_crisis_keywords() -> Vec<String> {
    [
        "انتحار",
        "أنتحر",
        "أقتل نفسي",
        "أموت",
        "أموت نفسي",
        "suicide",
        "kill myself",
        "die",
        "self-harm",
        "إيذاء نفسي",
    ]
    .map(String::from)
    .to_vec()
}

fn default_violence_keywords() -> Vec<String> {
    ["قتل", "عنف", "أؤذي أحد", "أؤذي شخص", "violence", "harm someone"]
        .map(String::from)
        .to_vec()
}

fn default_referral_keywords() -> Vec<String> {
    [
        "طبيب نفسي",
        "مستشفى",
        "مساعدة مختص",
        "أحتاج مختص",
        "أحتاج طبيب",
        "أحتاج علاج",
        "أحتاج دعم",
    ]
    .map(String::from)
    .to_vec()
}

fn default_severe_emotions() -> Vec<String> {
    ["يأس", "حزن شديد", "غضب شديد", "خوف شديد"]
        .map(String::from)
        .to_vec()
}

fn default_crisis_message() -> String {
    "يبدو أنك تمر بأزمة حرجة. أنصحك بالتواصل فوراً مع جهة طوارئ أو مختص نفسي. هل ترغب في الاتصال بخط المساعدة الوطني: 1234؟".to_string()
}

fn default_violence_message() -> String {
    "تم رصد إشارات عنف. سيتم تصعيد الجلسة لمختص فوراً حفاظاً على سلامتك وسلامة الآخرين.".to_string()
}

fn default_referral_message() -> String {
    "يبدو أنك بحاجة لدعم مختص. هل ترغب في التواصل مع طبيب أو مستشفى معتمد؟".to_string()
}

fn default_severe_emotion_message() -> String {
    "أشعر أنك تمر بمشاعر صعبة جداً. أنصحك بالتواصل مع مختص أو جهة دعم فوراً.".to_string()
}

impl Default for SafetyRules {
    fn default() -> Self {
        Self {
            crisis_keywords: default_crisis_keywords(),
            violence_keywords: default_violence_keywords(),
            referral_keywords: default_referral_keywords(),
            severe_emotions: default_severe_emotions(),
            crisis_message: default_crisis_message(),
            violence_message: default_violence_message(),
            referral_message: default_referral_message(),
            severe_emotion_message: default_severe_emotion_message(),
        }
    }
}

impl SafetyRules {
    /// Parse rules from TOML. Missing keys fall back to the built-in protocol.
    pub fn from_toml_str(raw: &str) -> SakinaResult<Self> {
        toml::from_str(raw).map_err(|e| SakinaError::Config(format!("safety rules parse failed: {}", e)))
    }

    /// Load rules from a TOML file so deployments can edit the protocol
    /// without recompiling.
    pub fn from_path(path: &Path) -> SakinaResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

/// Escalation classifier. Stateless and side-effect free.
#[derive(Debug, Clone, Default)]
pub struct SafetyEvaluator {
    rules: SafetyRules,
}

impl SafetyEvaluator {
    pub fn new(rules: SafetyRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &SafetyRules {
        &self.rules
    }

    /// Evaluate one transcript. Strict precedence, first match wins:
    /// crisis (keyword or `intent == "crisis"`), then violence, then
    /// referral, then severe emotion, then clear.
    pub fn evaluate(&self, text: &str, intent: &str, emotion: &str) -> SafetyVerdict {
        let r = &self.rules;
        if contains_any(text, &r.crisis_keywords) || intent == "crisis" {
            return SafetyVerdict::escalate(&r.crisis_message);
        }
        if contains_any(text, &r.violence_keywords) {
            return SafetyVerdict::escalate(&r.violence_message);
        }
        if contains_any(text, &r.referral_keywords) {
            return SafetyVerdict::escalate(&r.referral_message);
        }
        if r.severe_emotions.iter().any(|e| e == emotion) {
            return SafetyVerdict::escalate(&r.severe_emotion_message);
        }
        SafetyVerdict::clear()
    }
}

fn contains_any(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| text.contains(k.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> SafetyEvaluator {
        SafetyEvaluator::new(SafetyRules::default())
    }

    #[test]
    fn crisis_keyword_escalates_regardless_of_intent_and_emotion() {
        let v = evaluator().evaluate("أفكر في الانتحار", "استشارة", "أمل");
        assert!(v.is_escalation());
        assert_eq!(v.message(), Some(default_crisis_message().as_str()));
    }

    #[test]
    fn crisis_intent_escalates_on_clean_text() {
        let v = evaluator().evaluate("ما عاد أقدر", "crisis", "قلق");
        assert!(v.is_escalation());
        assert_eq!(v.message(), Some(default_crisis_message().as_str()));
    }

    #[test]
    fn crisis_takes_precedence_over_violence() {
        // Contains both a crisis keyword and a violence keyword.
        let v = evaluator().evaluate("انتحار قتل", "unknown", "unknown");
        assert_eq!(v.message(), Some(default_crisis_message().as_str()));
    }

    #[test]
    fn violence_then_referral_then_emotion_precedence() {
        let e = evaluator();
        let v = e.evaluate("أفكر في قتل شخص", "استشارة", "غضب");
        assert_eq!(v.message(), Some(default_violence_message().as_str()));

        let v = e.evaluate("أحتاج طبيب نفسي", "استشارة", "قلق");
        assert_eq!(v.message(), Some(default_referral_message().as_str()));

        let v = e.evaluate("كل شيء صعب", "استشارة", "يأس");
        assert_eq!(v.message(), Some(default_severe_emotion_message().as_str()));
    }

    #[test]
    fn substring_containment_matches_inside_longer_words() {
        // "العنف" contains the keyword "عنف" — accepted imprecision.
        let v = evaluator().evaluate("أخاف من العنف", "استشارة", "قلق");
        assert_eq!(v.message(), Some(default_violence_message().as_str()));
    }

    #[test]
    fn clean_text_and_mild_emotion_do_not_escalate() {
        let v = evaluator().evaluate("كيف أتعامل مع ضغوط العمل؟", "استشارة", "أمل");
        assert!(!v.is_escalation());
        assert!(v.message().is_none());
    }

    #[test]
    fn verdict_message_iff_escalation() {
        assert!(SafetyVerdict::clear().message().is_none());
        let v = SafetyVerdict::escalate("m");
        assert!(v.is_escalation() && v.message() == Some("m"));
    }

    #[test]
    fn rules_load_from_toml_with_defaults_for_missing_keys() {
        let rules = SafetyRules::from_toml_str(
            r#"
            crisis_keywords = ["نهاية"]
            crisis_message = "رسالة أزمة"
            "#,
        )
        .unwrap();
        assert_eq!(rules.crisis_keywords, vec!["نهاية".to_string()]);
        assert_eq!(rules.crisis_message, "رسالة أزمة");
        // Untouched sections keep the built-in protocol.
        assert_eq!(rules.referral_message, default_referral_message());

        let e = SafetyEvaluator::new(rules);
        assert!(e.evaluate("هذه نهاية الطريق", "unknown", "unknown").is_escalation());
        assert!(!e.evaluate("انتحار", "unknown", "unknown").is_escalation());
    }
}
