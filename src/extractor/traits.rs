use crate::extractor::models::VideoInfo;
use crate::utils::config::PipelineSettings;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Options handed to the extraction backend on every metadata lookup
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Accept invalid TLS certificates instead of aborting
    pub no_check_certificate: bool,
    /// Suppress diagnostic output
    pub quiet: bool,
    pub socket_timeout: Duration,
    pub user_agent: String,
    pub no_playlist: bool,
    pub geo_bypass: bool,
}

impl From<&PipelineSettings> for ExtractOptions {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            no_check_certificate: settings.no_check_certificate,
            quiet: true,
            socket_timeout: settings.socket_timeout(),
            user_agent: settings.user_agent.clone(),
            no_playlist: true,
            geo_bypass: settings.geo_bypass,
        }
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::from(&PipelineSettings::default())
    }
}

/// Core trait for metadata extraction backends
///
/// This trait isolates the pipeline from the specific extraction method
/// (yt-dlp, a native site extractor, a test double, ...).
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Returns a unique identifier for this extractor (e.g., "ytdlp")
    fn id(&self) -> &'static str;

    /// Extracts media information without downloading any media bytes
    async fn extract_info(&self, url: &str, options: &ExtractOptions) -> Result<VideoInfo>;
}
