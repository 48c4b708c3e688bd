//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::utils::error::PipelineError;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Explicit yt-dlp binary; discovered automatically when unset
    pub ytdlp_path: Option<PathBuf>,

    /// Per-connection socket timeout handed to the engine (seconds)
    pub socket_timeout_secs: u64,

    /// Hard deadline for a whole metadata resolution (seconds)
    pub resolve_timeout_secs: u64,

    /// Hard deadline for a whole download + post-processing run (seconds)
    pub download_timeout_secs: u64,

    /// User agent presented to upstream hosts
    pub user_agent: String,

    /// Accept invalid TLS certificates instead of aborting
    pub no_check_certificate: bool,

    /// Ask the engine to bypass geographic restrictions
    pub geo_bypass: bool,

    /// Codec for audio extraction
    pub audio_codec: String,

    /// Container for merged video output
    pub video_container: String,

    /// Height used when no video quality could be offered
    pub default_video_height: u32,

    /// Parent directory for scratch directories; system temp dir when unset
    pub scratch_root: Option<PathBuf>,

    /// Buffered progress events between engine and reporter
    pub progress_capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            socket_timeout_secs: 10,
            resolve_timeout_secs: 30,
            download_timeout_secs: 1800,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            no_check_certificate: true,
            geo_bypass: true,
            audio_codec: "mp3".to_string(),
            video_container: "mp4".to_string(),
            default_video_height: 1080,
            scratch_root: None,
            progress_capacity: 100,
        }
    }
}

impl PipelineSettings {
    /// Load settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let settings: PipelineSettings = serde_json::from_str(&content)?;
        Ok(settings.validated())
    }

    /// Enforce sane minimums
    pub fn validated(mut self) -> Self {
        if self.socket_timeout_secs == 0 {
            self.socket_timeout_secs = 1;
        }
        if self.resolve_timeout_secs == 0 {
            self.resolve_timeout_secs = 1;
        }
        if self.download_timeout_secs == 0 {
            self.download_timeout_secs = 1;
        }
        if self.progress_capacity == 0 {
            self.progress_capacity = 1;
        }
        if self.default_video_height == 0 {
            self.default_video_height = 1080;
        }
        if self.audio_codec.trim().is_empty() {
            self.audio_codec = "mp3".to_string();
        }
        if self.video_container.trim().is_empty() {
            self.video_container = "mp4".to_string();
        }
        self
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_secs(self.socket_timeout_secs)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
