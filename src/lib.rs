//! mediagrab library
//!
//! Resolve a media URL, pick a quality, and fetch a single converted file
//! with live progress.

pub mod catalog;
pub mod downloader;
pub mod extractor;
pub mod utils;

// Re-export main types for easier use
pub use catalog::{MediaKind, QualitySelection};
pub use downloader::{DownloadOrchestrator, DownloadProgressEvent, DownloadedFile, ProgressPhase};
pub use extractor::{MediaDescriptor, SourceResolver, Variant, VariantKind};
pub use utils::{PipelineError, PipelineSettings};
