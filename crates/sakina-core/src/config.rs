//! Pipeline configuration loaded from the environment at startup.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | SAKINA_RESPONSE_STRATEGY | fast | "fast" \| "dual" — response generation strategy. |
//! | SAKINA_FAST_TIMEOUT_SECS | 10 | Fast-mode completion request timeout. |
//! | SAKINA_MEDIA_DIR | tmp/media | Where synthesized audio is stored and served from. |
//! | SAKINA_WORK_DIR | tmp/work | Scratch space for uploads and normalized WAVs. |
//! | SAKINA_SAFETY_RULES | (unset) | Optional TOML file overriding the safety keyword lists/messages. |

use std::path::PathBuf;
use std::time::Duration;

use crate::generation::ResponseStrategy;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub strategy: ResponseStrategy,
    pub fast_timeout: Duration,
    pub media_dir: PathBuf,
    pub work_dir: PathBuf,
    pub safety_rules_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strategy: ResponseStrategy::Fast,
            fast_timeout: Duration::from_secs(10),
            media_dir: PathBuf::from("tmp/media"),
            work_dir: PathBuf::from("tmp/work"),
            safety_rules_path: None,
        }
    }
}

impl PipelineConfig {
    /// Load from environment. Unset or invalid values fall back to defaults
    /// (see the table in the module docs).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let fast_timeout = std::env::var("SAKINA_FAST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.fast_timeout);
        Self {
            strategy: ResponseStrategy::from_env(),
            fast_timeout,
            media_dir: env_path("SAKINA_MEDIA_DIR", defaults.media_dir),
            work_dir: env_path("SAKINA_WORK_DIR", defaults.work_dir),
            safety_rules_path: std::env::var("SAKINA_SAFETY_RULES").ok().map(PathBuf::from),
        }
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v),
        _ => default,
    }
}
