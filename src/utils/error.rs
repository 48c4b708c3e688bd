//! Error handling for mediagrab

use thiserror::Error;

/// Main error type for the resolution and acquisition pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("yt-dlp not found. Please install yt-dlp")]
    YtDlpNotFound,

    #[error("Failed to resolve media: {0}")]
    Resolution(String),

    #[error("No valid quality selected: {0}")]
    Selection(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("downloaded file is empty")]
    EmptyOutput,

    #[error("Download produced several candidate files: {}", .0.join(", "))]
    AmbiguousOutput(Vec<String>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Which pipeline stage a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Resolution,
    Selection,
    Download,
}

impl PipelineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::YtDlpNotFound | PipelineError::Resolution(_) => {
                ErrorCategory::Resolution
            }
            PipelineError::Selection(_) => ErrorCategory::Selection,
            PipelineError::Download(_)
            | PipelineError::EmptyOutput
            | PipelineError::AmbiguousOutput(_)
            | PipelineError::Io(_)
            | PipelineError::Serialization(_) => ErrorCategory::Download,
        }
    }

    /// Wrap an anyhow chain from a backend, keeping every context layer in the message
    pub(crate) fn resolution(err: anyhow::Error) -> Self {
        match err.downcast::<PipelineError>() {
            Ok(inner) => inner,
            Err(err) => PipelineError::Resolution(format!("{:#}", err)),
        }
    }

    pub(crate) fn download(err: anyhow::Error) -> Self {
        match err.downcast::<PipelineError>() {
            Ok(inner) => inner,
            Err(err) => PipelineError::Download(format!("{:#}", err)),
        }
    }
}
