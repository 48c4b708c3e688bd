//! Utility modules for error handling, configuration and display formatting

pub mod config;
pub mod error;
pub mod format;

// Re-export for convenience
pub use config::PipelineSettings;
pub use error::{ErrorCategory, PipelineError};
