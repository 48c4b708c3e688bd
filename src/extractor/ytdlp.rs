//! yt-dlp wrapper for metadata extraction
//!
//! This module handles media information extraction using yt-dlp and owns
//! the binary discovery shared with the download engine.

use crate::extractor::models::VideoInfo;
use crate::extractor::traits::{ExtractOptions, Extractor};
use crate::utils::error::PipelineError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, error, info, warn};

/// Environment variable that pins the yt-dlp binary
pub const YTDLP_ENV: &str = "MEDIAGRAB_YTDLP";

/// Metadata extractor backed by the yt-dlp executable
pub struct YtDlpExtractor {
    ytdlp_path: PathBuf,
}

impl YtDlpExtractor {
    /// Initialize extractor and verify yt-dlp availability
    pub fn new() -> Result<Self, PipelineError> {
        Self::with_path(None)
    }

    /// Use `explicit` when given, otherwise discover yt-dlp
    pub fn with_path(explicit: Option<&Path>) -> Result<Self, PipelineError> {
        let ytdlp_path = match explicit.map(Path::to_path_buf).or_else(find_ytdlp) {
            Some(path) => {
                info!("Found yt-dlp at: {}", path.display());
                path
            }
            None => {
                error!("yt-dlp not found anywhere!");
                return Err(PipelineError::YtDlpNotFound);
            }
        };

        Ok(Self { ytdlp_path })
    }

    /// Get the path to yt-dlp being used
    pub fn ytdlp_path(&self) -> &Path {
        &self.ytdlp_path
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn id(&self) -> &'static str {
        "ytdlp"
    }

    /// Uses: yt-dlp --dump-single-json --skip-download
    async fn extract_info(&self, url: &str, options: &ExtractOptions) -> Result<VideoInfo> {
        debug!("Extracting media info for URL: {}", url);

        let mut cmd = AsyncCommand::new(&self.ytdlp_path);
        cmd.arg("--dump-single-json").arg("--skip-download");
        if options.quiet {
            cmd.arg("--quiet");
        }
        cmd.args(common_args(options))
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = cmd.output().await.context("Failed to run yt-dlp")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = error_message(&stderr, output.status.code());
            error!("yt-dlp extraction failed: {}", message);
            return Err(anyhow::anyhow!(message));
        }

        let json_str = String::from_utf8(output.stdout).context("yt-dlp printed invalid UTF-8")?;
        let video_info: VideoInfo =
            serde_json::from_str(&json_str).context("Unexpected yt-dlp JSON")?;

        Ok(video_info)
    }
}

/// Arguments shared by metadata lookups and downloads
pub(crate) fn common_args(options: &ExtractOptions) -> Vec<String> {
    let mut args = Vec::new();
    if options.quiet {
        args.push("--no-warnings".to_string());
    }
    if options.no_check_certificate {
        args.push("--no-check-certificate".to_string());
    }
    args.push("--socket-timeout".to_string());
    args.push(options.socket_timeout.as_secs().max(1).to_string());
    if !options.user_agent.is_empty() {
        args.push("--user-agent".to_string());
        args.push(options.user_agent.clone());
    }
    if options.no_playlist {
        args.push("--no-playlist".to_string());
    }
    if options.geo_bypass {
        args.push("--geo-bypass".to_string());
    }
    args
}

/// Pick the most useful line out of yt-dlp's stderr
pub(crate) fn error_message(stderr: &str, code: Option<i32>) -> String {
    if let Some(line) = stderr.lines().rev().find(|l| l.contains("ERROR:")) {
        return line.trim().to_string();
    }
    match stderr.lines().rev().find(|l| !l.trim().is_empty()) {
        Some(line) => line.trim().to_string(),
        None => match code {
            Some(code) => format!("yt-dlp exited with status {}", code),
            None => "yt-dlp was terminated by a signal".to_string(),
        },
    }
}

// ============================================================
// yt-dlp Detection Functions
// ============================================================

/// Find yt-dlp binary with priority:
/// 1. `MEDIAGRAB_YTDLP`
/// 2. Next to the current executable
/// 3. System PATH
/// 4. Common installation paths
pub fn find_ytdlp() -> Option<PathBuf> {
    if let Some(pinned) = std::env::var_os(YTDLP_ENV).map(PathBuf::from) {
        if is_executable(&pinned) {
            info!("✓ Using yt-dlp from {}: {:?}", YTDLP_ENV, pinned);
            return Some(pinned);
        }
        warn!("{} points at {:?}, which is not executable", YTDLP_ENV, pinned);
    }

    if let Some(local) = find_next_to_exe() {
        info!("✓ Using bundled yt-dlp: {:?}", local);
        return Some(local);
    }

    if let Ok(system) = which::which("yt-dlp") {
        info!("✓ Using system yt-dlp: {:?}", system);
        return Some(system);
    }

    if let Some(common) = find_in_common_paths() {
        info!("✓ Using yt-dlp from common path: {:?}", common);
        return Some(common);
    }

    warn!("✗ yt-dlp not found anywhere!");
    None
}

fn find_next_to_exe() -> Option<PathBuf> {
    let exe_path = std::env::current_exe().ok()?;
    let candidate = exe_path.parent()?.join(binary_name());
    is_executable(&candidate).then_some(candidate)
}

fn find_in_common_paths() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = [
        // macOS Homebrew (Apple Silicon)
        "/opt/homebrew/bin/yt-dlp",
        // macOS Homebrew (Intel)
        "/usr/local/bin/yt-dlp",
        "/usr/bin/yt-dlp",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();

    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".local").join("bin").join("yt-dlp"));
    }

    candidates.into_iter().find(|p| is_executable(p))
}

fn binary_name() -> &'static str {
    if cfg!(windows) {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    }
}

/// Check if a file is executable
fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        std::fs::metadata(path)
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

// ============================================================
// Tests
// ============================================================
