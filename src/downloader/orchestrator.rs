//! Drives one download attempt from format selection to deliverable bytes

use crate::catalog::{format_selector, MediaKind, QualitySelection};
use crate::downloader::engine::{DownloadEngine, EngineRequest, PostProcess};
use crate::downloader::progress::{DownloadProgressEvent, ProgressReporter};
use crate::downloader::scratch::ScratchSpace;
use crate::extractor::resolver::validate_url;
use crate::extractor::traits::ExtractOptions;
use crate::utils::config::PipelineSettings;
use crate::utils::error::PipelineError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Files the engine leaves behind mid-flight
const LEFTOVER_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp"];

/// The single deliverable of a successful download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

/// Runs one download per call inside its own scratch directory
pub struct DownloadOrchestrator {
    engine: Arc<dyn DownloadEngine>,
    scratch: ScratchSpace,
    options: ExtractOptions,
    audio_codec: String,
    video_container: String,
    timeout: Duration,
    progress_capacity: usize,
}

impl DownloadOrchestrator {
    pub fn new(engine: Arc<dyn DownloadEngine>, settings: &PipelineSettings) -> Self {
        Self {
            engine,
            scratch: ScratchSpace::new(settings.scratch_root()),
            options: ExtractOptions::from(settings),
            audio_codec: settings.audio_codec.clone(),
            video_container: settings.video_container.clone(),
            timeout: settings.download_timeout(),
            progress_capacity: settings.progress_capacity.max(1),
        }
    }

    pub fn post_process_for(&self, kind: MediaKind) -> PostProcess {
        match kind {
            MediaKind::Audio => PostProcess::ExtractAudio {
                codec: self.audio_codec.clone(),
            },
            MediaKind::Video => PostProcess::Merge {
                container: self.video_container.clone(),
            },
        }
    }

    /// Download `url` as `kind` at `selection`, streaming progress to `observer`.
    ///
    /// The engine runs exactly once. No retry is attempted; the scratch
    /// directory is gone by the time this returns.
    pub async fn download(
        &self,
        url: &str,
        kind: MediaKind,
        selection: QualitySelection,
        observer: mpsc::Sender<DownloadProgressEvent>,
    ) -> Result<DownloadedFile, PipelineError> {
        let download_id = Uuid::new_v4();
        let url = validate_url(url).map_err(|e| match e {
            PipelineError::Resolution(msg) => PipelineError::Download(msg),
            other => other,
        })?;
        let format = format_selector(kind, &selection)?;
        let post_process = self.post_process_for(kind);
        let expected_ext = post_process.expected_extension();

        info!(
            "[{}] Downloading {} as {} with format '{}' via {}",
            download_id,
            url,
            kind,
            format,
            self.engine.id()
        );

        let mut reporter = ProgressReporter::new(observer);

        let result = self
            .scratch
            .with_directory(|dir| async move {
                let request = EngineRequest {
                    url,
                    output_dir: dir.clone(),
                    output_template: OUTPUT_TEMPLATE.to_string(),
                    format,
                    post_process,
                    options: self.options.clone(),
                };

                // The deadline covers progress delivery too, so a stalled
                // observer cannot hold the download past it
                let (updates_tx, updates_rx) = mpsc::channel(self.progress_capacity);
                let run = async {
                    let (fetched, ()) = tokio::join!(
                        self.engine.fetch(&request, updates_tx),
                        reporter.run(updates_rx)
                    );
                    fetched
                };
                let outcome = tokio::time::timeout(self.timeout, run).await;

                let engine_result = match outcome {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(PipelineError::download(e)),
                    Err(_) => Err(PipelineError::Download(format!(
                        "timed out after {}s",
                        self.timeout.as_secs()
                    ))),
                };

                match engine_result {
                    Ok(()) => reporter.finish().await,
                    Err(e) => {
                        reporter.fail(&e.to_string()).await;
                        return Err(e);
                    }
                }

                let path = select_output(&dir, &expected_ext).await?;
                read_output(&path).await
            })
            .await;

        match &result {
            Ok(file) => info!(
                "[{}] Delivered {} ({} bytes)",
                download_id,
                file.file_name,
                file.bytes.len()
            ),
            Err(e) => error!("[{}] Download failed: {}", download_id, e),
        }
        result
    }
}

fn is_leftover(name: &str) -> bool {
    LEFTOVER_SUFFIXES.iter().any(|s| name.ends_with(s)) || name.contains(".part-Frag")
}

/// Non-empty regular files in `dir`, sorted by name
async fn output_candidates(dir: &Path) -> Result<Vec<String>, PipelineError> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !metadata.is_file() || metadata.len() == 0 {
            continue;
        }
        if is_leftover(&name) {
            debug!("Ignoring engine leftover {}", name);
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

/// Pick the deliverable among `candidates` (sorted, non-empty files).
///
/// A single file with the expected extension wins. Without any match a lone
/// candidate is accepted as is; anything else is ambiguous.
pub(crate) fn choose_output(candidates: &[String], expected_ext: &str) -> Result<String, PipelineError> {
    if candidates.is_empty() {
        return Err(PipelineError::EmptyOutput);
    }

    let suffix = format!(".{}", expected_ext.to_ascii_lowercase());
    let matching: Vec<&String> = candidates
        .iter()
        .filter(|name| name.to_ascii_lowercase().ends_with(&suffix))
        .collect();

    match matching.as_slice() {
        [only] => Ok((*only).clone()),
        [] if candidates.len() == 1 => {
            warn!(
                "Output {} does not have the expected .{} extension",
                candidates[0], expected_ext
            );
            Ok(candidates[0].clone())
        }
        [] => Err(PipelineError::AmbiguousOutput(candidates.to_vec())),
        many => Err(PipelineError::AmbiguousOutput(
            many.iter().map(|s| (*s).clone()).collect(),
        )),
    }
}

async fn select_output(dir: &Path, expected_ext: &str) -> Result<PathBuf, PipelineError> {
    let candidates = output_candidates(dir).await?;
    let chosen = choose_output(&candidates, expected_ext)?;
    Ok(dir.join(chosen))
}

async fn read_output(path: &Path) -> Result<DownloadedFile, PipelineError> {
    let bytes = tokio::fs::read(path).await?;
    if bytes.is_empty() {
        return Err(PipelineError::EmptyOutput);
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or(PipelineError::EmptyOutput)?;

    Ok(DownloadedFile { bytes, file_name })
}
