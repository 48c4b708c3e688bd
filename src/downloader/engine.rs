//! Download/transcode engine abstraction and its yt-dlp implementation

use crate::downloader::progress::{EngineUpdate, RawProgress};
use crate::extractor::traits::ExtractOptions;
use crate::extractor::ytdlp::{common_args, error_message};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as AsyncCommand;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

const PROGRESS_MARKER: &str = "mediagrab-progress:";
const POSTPROCESS_MARKER: &str = "mediagrab-postprocess:";
const STDERR_TAIL: usize = 50;

/// Post-download step that produces the single deliverable file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcess {
    /// Transcode the fetched audio to `codec`
    ExtractAudio { codec: String },
    /// Mux separately fetched streams into `container`
    Merge { container: String },
}

impl PostProcess {
    /// File extension the engine will give the deliverable
    pub fn expected_extension(&self) -> String {
        match self {
            PostProcess::ExtractAudio { codec } => match codec.as_str() {
                "aac" | "alac" | "m4a" => "m4a".to_string(),
                "vorbis" => "ogg".to_string(),
                other => other.to_string(),
            },
            PostProcess::Merge { container } => container.clone(),
        }
    }
}

/// Everything the engine needs for one fetch
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub url: String,
    /// Directory the engine must write into
    pub output_dir: PathBuf,
    /// File name template, relative to `output_dir`
    pub output_template: String,
    /// Format-selector expression
    pub format: String,
    pub post_process: PostProcess,
    pub options: ExtractOptions,
}

impl EngineRequest {
    pub fn output_path_template(&self) -> PathBuf {
        self.output_dir.join(&self.output_template)
    }
}

/// Performs the actual network fetch and post-processing
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    fn id(&self) -> &'static str;

    /// Fetch `request` into its output directory, streaming progress into
    /// `updates` as it happens. Dropping `updates` signals the end of progress.
    async fn fetch(&self, request: &EngineRequest, updates: mpsc::Sender<EngineUpdate>) -> Result<()>;
}

/// Download engine driving the yt-dlp executable
pub struct YtDlpEngine {
    ytdlp_path: PathBuf,
}

impl YtDlpEngine {
    pub fn new(ytdlp_path: impl Into<PathBuf>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
        }
    }

    pub fn ytdlp_path(&self) -> &Path {
        &self.ytdlp_path
    }
}

/// Command-line arguments for one request, URL last
pub(crate) fn build_args(request: &EngineRequest) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--newline".into(),
        "--progress".into(),
        "--progress-template".into(),
        format!("download:{}%(progress)j", PROGRESS_MARKER),
        "--progress-template".into(),
        format!(
            "postprocess:{}%(progress.status)s:%(progress.postprocessor)s",
            POSTPROCESS_MARKER
        ),
        "-f".into(),
        request.format.clone(),
        "-o".into(),
        request.output_path_template().to_string_lossy().into_owned(),
    ];

    match &request.post_process {
        PostProcess::ExtractAudio { codec } => {
            args.extend([
                "--extract-audio".to_string(),
                "--audio-format".to_string(),
                codec.clone(),
            ]);
        }
        PostProcess::Merge { container } => {
            args.extend(["--merge-output-format".to_string(), container.clone()]);
        }
    }

    args.extend(common_args(&request.options));
    args.push("--".into());
    args.push(request.url.clone());
    args
}

/// Recognize one of our machine-readable stdout lines
pub(crate) fn parse_line(line: &str) -> Option<EngineUpdate> {
    let line = line.trim();

    if let Some(json) = line.strip_prefix(PROGRESS_MARKER) {
        return match serde_json::from_str::<RawProgress>(json) {
            Ok(raw) => Some(EngineUpdate::Progress(raw)),
            Err(e) => {
                debug!("Unparseable progress payload ({}): {}", e, json);
                None
            }
        };
    }

    let rest = line.strip_prefix(POSTPROCESS_MARKER)?;
    let (status, postprocessor) = rest.split_once(':')?;
    (status == "started").then(|| EngineUpdate::PostProcessing {
        postprocessor: postprocessor.to_string(),
    })
}

#[async_trait]
impl DownloadEngine for YtDlpEngine {
    fn id(&self) -> &'static str {
        "ytdlp"
    }

    async fn fetch(&self, request: &EngineRequest, updates: mpsc::Sender<EngineUpdate>) -> Result<()> {
        let args = build_args(request);
        debug!("Spawning {} {:?}", self.ytdlp_path.display(), args);

        let mut child = AsyncCommand::new(&self.ytdlp_path)
            .args(&args)
            .current_dir(&request.output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.ytdlp_path.display()))?;

        // Keep the tail of stderr for the error message
        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut tail = VecDeque::with_capacity(STDERR_TAIL);
                let mut segments = BufReader::new(stderr).split(b'\n');
                while let Ok(Some(segment)) = segments.next_segment().await {
                    if tail.len() == STDERR_TAIL {
                        tail.pop_front();
                    }
                    tail.push_back(String::from_utf8_lossy(&segment).trim_end().to_string());
                }
                tail.into_iter().collect::<Vec<_>>().join("\n")
            })
        });

        if let Some(stdout) = child.stdout.take() {
            // Titles arrive in the console encoding, which need not be UTF-8
            let mut segments = BufReader::new(stdout).split(b'\n');
            let mut receiver_open = true;
            while let Some(segment) = segments
                .next_segment()
                .await
                .context("Failed to read yt-dlp output")?
            {
                let line = String::from_utf8_lossy(&segment);
                match parse_line(&line) {
                    Some(update) if receiver_open => {
                        if updates.send(update).await.is_err() {
                            warn!("Progress receiver dropped, continuing without progress");
                            receiver_open = false;
                        }
                    }
                    Some(_) => {}
                    None => debug!("yt-dlp: {}", line),
                }
            }
        }
        drop(updates);

        let status = child.wait().await.context("Failed to wait for yt-dlp process")?;
        let stderr = match stderr_task {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            Ok(())
        } else {
            let message = error_message(&stderr, status.code());
            error!("yt-dlp download failed: {}", message);
            Err(anyhow::anyhow!(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(post_process: PostProcess) -> EngineRequest {
        EngineRequest {
            url: "https://example.com/watch?v=1".into(),
            output_dir: PathBuf::from("/tmp/scratch"),
            output_template: "%(title)s.%(ext)s".into(),
            format: "bestaudio/best".into(),
            post_process,
            options: ExtractOptions::default(),
        }
    }

    #[test]
    fn test_build_args_audio() {
        let args = build_args(&request(PostProcess::ExtractAudio { codec: "mp3".into() }));

        let f = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(args[f + 1], "bestaudio/best");
        let o = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[o + 1], "/tmp/scratch/%(title)s.%(ext)s");
        assert!(args.contains(&"--extract-audio".to_string()));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(!args.contains(&"--merge-output-format".to_string()));
        assert_eq!(args.last().unwrap(), "https://example.com/watch?v=1");
        assert_eq!(args[args.len() - 2], "--");
    }

    #[test]
    fn test_build_args_video() {
        let args = build_args(&request(PostProcess::Merge { container: "mp4".into() }));
        let m = args.iter().position(|a| a == "--merge-output-format").unwrap();
        assert_eq!(args[m + 1], "mp4");
        assert!(!args.contains(&"--extract-audio".to_string()));
    }

    #[test]
    fn test_expected_extension() {
        assert_eq!(PostProcess::ExtractAudio { codec: "mp3".into() }.expected_extension(), "mp3");
        assert_eq!(PostProcess::ExtractAudio { codec: "aac".into() }.expected_extension(), "m4a");
        assert_eq!(PostProcess::ExtractAudio { codec: "vorbis".into() }.expected_extension(), "ogg");
        assert_eq!(PostProcess::Merge { container: "mkv".into() }.expected_extension(), "mkv");
    }

    #[test]
    fn test_parse_progress_line() {
        let line = r#"mediagrab-progress:{"status": "downloading", "downloaded_bytes": 1024, "total_bytes": null, "total_bytes_estimate": 4096.5, "speed": 2048.0, "eta": 3, "filename": "x.webm"}"#;
        match parse_line(line) {
            Some(EngineUpdate::Progress(raw)) => {
                assert_eq!(raw.status, "downloading");
                assert_eq!(raw.downloaded_bytes, Some(1024.0));
                assert_eq!(raw.total_bytes, None);
                assert_eq!(raw.total_bytes_estimate, Some(4096.5));
                assert_eq!(raw.eta, Some(3.0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_postprocess_line() {
        match parse_line("mediagrab-postprocess:started:ExtractAudio") {
            Some(EngineUpdate::PostProcessing { postprocessor }) => {
                assert_eq!(postprocessor, "ExtractAudio")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse_line("mediagrab-postprocess:finished:ExtractAudio").is_none());
    }

    #[cfg(unix)]
    fn fake_ytdlp(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("yt-dlp");
        std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_survives_non_utf8_output() {
        let bin = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let script = fake_ytdlp(
            bin.path(),
            concat!(
                "printf '[download] Destination: Caf\\351.webm\\n'\n",
                "printf '%s\\n' 'mediagrab-progress:{\"status\": \"downloading\", \"downloaded_bytes\": 5, \"total_bytes\": 10}'\n",
                "printf 'video' > Demo.mp4\n",
                "exit 0\n",
            ),
        );

        let mut req = request(PostProcess::Merge { container: "mp4".into() });
        req.output_dir = out.path().to_path_buf();
        let (tx, mut rx) = mpsc::channel(8);

        YtDlpEngine::new(script).fetch(&req, tx).await.unwrap();

        match rx.recv().await {
            Some(EngineUpdate::Progress(raw)) => assert_eq!(raw.downloaded_bytes, Some(5.0)),
            other => panic!("unexpected {:?}", other),
        }
        assert!(out.path().join("Demo.mp4").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_reports_error_line() {
        let bin = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let script = fake_ytdlp(
            bin.path(),
            "echo 'WARNING: slow' >&2\necho 'ERROR: [youtube] x: Video unavailable' >&2\nexit 1\n",
        );

        let mut req = request(PostProcess::ExtractAudio { codec: "mp3".into() });
        req.output_dir = out.path().to_path_buf();
        let (tx, _rx) = mpsc::channel(8);

        let err = YtDlpEngine::new(script).fetch(&req, tx).await.unwrap_err();
        assert_eq!(err.to_string(), "ERROR: [youtube] x: Video unavailable");
    }

    #[test]
    fn test_parse_other_lines() {
        assert!(parse_line("[youtube] abc: Downloading webpage").is_none());
        assert!(parse_line("mediagrab-progress:{not json").is_none());
        assert!(parse_line("").is_none());
    }
}
