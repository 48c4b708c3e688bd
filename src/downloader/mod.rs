//! Download pipeline: engine, progress, scratch space and orchestration

pub mod engine;
pub mod orchestrator;
pub mod progress;
pub mod scratch;

// Re-export for convenience
pub use engine::{DownloadEngine, EngineRequest, PostProcess, YtDlpEngine};
pub use orchestrator::{DownloadOrchestrator, DownloadedFile};
pub use progress::{DownloadProgressEvent, EngineUpdate, ProgressPhase, ProgressReporter, RawProgress};
pub use scratch::ScratchSpace;
