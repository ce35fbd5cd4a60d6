//! Audio normalization: arbitrary container/codec input to mono 16 kHz PCM
//! WAV via ffmpeg.
//!
//! The conversion runs as a child process through `tokio::process`, so the
//! native work never blocks the cooperative scheduler. A non-zero exit
//! writes the captured stderr to a log artifact and maps to a pipeline-fatal
//! conversion error naming that artifact.

use std::path::{Path, PathBuf};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{SakinaError, SakinaResult};

#[derive(Debug, Clone)]
pub struct AudioConverter {
    ffmpeg_bin: String,
    work_dir: PathBuf,
}

impl AudioConverter {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            work_dir: work_dir.into(),
        }
    }

    /// Substitute the converter binary (tests use a command that always fails).
    pub fn with_binary(mut self, bin: impl Into<String>) -> Self {
        self.ffmpeg_bin = bin.into();
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Write raw upload bytes to the work dir under their original container
    /// extension, normalize, and clean the raw file up. Returns the WAV path;
    /// the caller owns (and removes) the WAV once transcription is done.
    pub async fn normalize_bytes(&self, bytes: &[u8], container: &str) -> SakinaResult<PathBuf> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let ext = if container.is_empty() { "webm" } else { container };
        let raw = self.work_dir.join(format!("{}.{}", Uuid::new_v4(), ext));
        tokio::fs::write(&raw, bytes).await?;
        let result = self.normalize_to_wav(&raw).await;
        let _ = tokio::fs::remove_file(&raw).await;
        result
    }

    /// Run `ffmpeg -y -i <input> -ar 16000 -ac 1 -f wav <out>`.
    pub async fn normalize_to_wav(&self, input: &Path) -> SakinaResult<PathBuf> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let id = Uuid::new_v4();
        let wav = self.work_dir.join(format!("{}.wav", id));
        let output = tokio::process::Command::new(&self.ffmpeg_bin)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-ar", "16000", "-ac", "1", "-f", "wav"])
            .arg(&wav)
            .output()
            .await
            .map_err(|e| SakinaError::Conversion(format!("failed to run {}: {}", self.ffmpeg_bin, e)))?;
        if !output.status.success() {
            let log_path = self.work_dir.join(format!("{}_ffmpeg.log", id));
            let _ = tokio::fs::write(&log_path, &output.stderr).await;
            let _ = tokio::fs::remove_file(&wav).await;
            error!(target: "sakina::convert", "{} exited with {}, see {}", self.ffmpeg_bin, output.status, log_path.display());
            return Err(SakinaError::Conversion(format!(
                "{} exited with {} (log: {})",
                self.ffmpeg_bin,
                output.status,
                log_path.display()
            )));
        }
        debug!(target: "sakina::convert", "normalized {} -> {}", input.display(), wav.display());
        Ok(wav)
    }
}
