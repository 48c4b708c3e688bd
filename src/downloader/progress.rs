//! Progress tracking for downloads
//!
//! The engine produces [`EngineUpdate`]s; the [`ProgressReporter`] maps them
//! to [`DownloadProgressEvent`]s and forwards those to a single observer.

use crate::utils::format::{format_bytes, format_eta, format_speed};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// How long a terminal event may wait for room in the observer's channel
const TERMINAL_SEND_GRACE: Duration = Duration::from_secs(2);

/// Raw progress payload as reported by the download engine
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProgress {
    #[serde(default)]
    pub status: String,
    pub downloaded_bytes: Option<f64>,
    pub total_bytes: Option<f64>,
    pub total_bytes_estimate: Option<f64>,
    pub speed: Option<f64>,
    pub eta: Option<f64>,
}

/// What the engine can tell us while it runs
#[derive(Debug, Clone)]
pub enum EngineUpdate {
    Progress(RawProgress),
    /// All fetching is done and a transcode or mux is starting
    PostProcessing { postprocessor: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressPhase {
    Downloading,
    Finished,
    Failed(String),
}

/// One progress report delivered to the observer
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgressEvent {
    pub phase: ProgressPhase,
    pub downloaded_bytes: u64,
    /// `None` when the engine does not know the size
    pub total_bytes: Option<u64>,
    pub speed_bytes_per_sec: Option<f64>,
    pub eta: Option<Duration>,
}

impl DownloadProgressEvent {
    /// Progress percentage in `0.0..=100.0`, `None` if the total is unknown
    pub fn percentage(&self) -> Option<f64> {
        if self.phase == ProgressPhase::Finished {
            return Some(100.0);
        }
        match self.total_bytes {
            Some(total) if total > 0 => {
                let pct = self.downloaded_bytes as f64 / total as f64 * 100.0;
                Some(pct.clamp(0.0, 100.0))
            }
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.phase, ProgressPhase::Downloading)
    }
}

impl fmt::Display for DownloadProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.phase {
            ProgressPhase::Finished => write!(f, "Download complete, now post-processing..."),
            ProgressPhase::Failed(reason) => write!(f, "{}", reason),
            ProgressPhase::Downloading => {
                let speed = format_speed(self.speed_bytes_per_sec);
                let eta = format_eta(self.eta);
                match (self.percentage(), self.total_bytes) {
                    (Some(pct), Some(total)) => write!(
                        f,
                        "{:.1}% of {} at {} ETA {}",
                        pct,
                        format_bytes(total),
                        speed,
                        eta
                    ),
                    _ => write!(
                        f,
                        "{} downloaded at {} ETA {}",
                        format_bytes(self.downloaded_bytes),
                        speed,
                        eta
                    ),
                }
            }
        }
    }
}

fn to_bytes(value: Option<f64>) -> Option<u64> {
    value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u64)
}

/// Maps engine updates onto observer events.
///
/// Exactly one terminal event (`Finished` or `Failed`) is ever sent, and
/// nothing is sent after it. Terminal events wait at most
/// `TERMINAL_SEND_GRACE` for a full observer channel.
pub struct ProgressReporter {
    observer: mpsc::Sender<DownloadProgressEvent>,
    last_downloaded: u64,
    last_total: Option<u64>,
    terminal_sent: bool,
    observer_gone: bool,
}

impl ProgressReporter {
    pub fn new(observer: mpsc::Sender<DownloadProgressEvent>) -> Self {
        Self {
            observer,
            last_downloaded: 0,
            last_total: None,
            terminal_sent: false,
            observer_gone: false,
        }
    }

    /// Pure mapping of one update; `None` means nothing to report
    pub fn map(&mut self, update: EngineUpdate) -> Option<DownloadProgressEvent> {
        if self.terminal_sent {
            return None;
        }

        match update {
            EngineUpdate::Progress(raw) => match raw.status.as_str() {
                "downloading" | "finished" => {
                    let total = to_bytes(raw.total_bytes).or_else(|| to_bytes(raw.total_bytes_estimate));
                    let mut downloaded = to_bytes(raw.downloaded_bytes).unwrap_or(0);
                    // A stream that finished is complete whatever its last report said
                    if raw.status == "finished" {
                        downloaded = total.unwrap_or(downloaded).max(downloaded);
                    }
                    self.last_downloaded = downloaded;
                    self.last_total = total;

                    Some(DownloadProgressEvent {
                        phase: ProgressPhase::Downloading,
                        downloaded_bytes: downloaded,
                        total_bytes: total.or((raw.status == "finished").then_some(downloaded)),
                        speed_bytes_per_sec: raw.speed.filter(|s| s.is_finite() && *s >= 0.0),
                        eta: raw.eta.and_then(|e| Duration::try_from_secs_f64(e).ok()),
                    })
                }
                // The engine's exit status decides the outcome
                "error" => {
                    warn!("Engine reported a download error; waiting for its exit status");
                    None
                }
                other => {
                    debug!("Ignoring engine progress status '{}'", other);
                    None
                }
            },
            EngineUpdate::PostProcessing { postprocessor } => {
                debug!("Post-processing started: {}", postprocessor);
                Some(self.finished_event())
            }
        }
    }

    fn finished_event(&mut self) -> DownloadProgressEvent {
        self.terminal_sent = true;
        let total = self.last_total.unwrap_or(self.last_downloaded).max(self.last_downloaded);
        DownloadProgressEvent {
            phase: ProgressPhase::Finished,
            downloaded_bytes: total,
            total_bytes: Some(total),
            speed_bytes_per_sec: None,
            eta: Some(Duration::ZERO),
        }
    }

    fn failed_event(&mut self, reason: String) -> DownloadProgressEvent {
        self.terminal_sent = true;
        DownloadProgressEvent {
            phase: ProgressPhase::Failed(reason),
            downloaded_bytes: self.last_downloaded,
            total_bytes: self.last_total,
            speed_bytes_per_sec: None,
            eta: None,
        }
    }

    /// Map and deliver one update
    pub async fn report(&mut self, update: EngineUpdate) {
        if let Some(event) = self.map(update) {
            self.send(event).await;
        }
    }

    /// Deliver the terminal `Finished` event unless one was already sent
    pub async fn finish(&mut self) {
        if !self.terminal_sent {
            let event = self.finished_event();
            self.send_terminal(event).await;
        }
    }

    /// Deliver a terminal `Failed` event unless a terminal event was already sent
    pub async fn fail(&mut self, reason: &str) {
        if !self.terminal_sent {
            let event = self.failed_event(reason.to_string());
            self.send_terminal(event).await;
        }
    }

    /// Drain `updates` until the engine drops its sender
    pub async fn run(&mut self, mut updates: mpsc::Receiver<EngineUpdate>) {
        while let Some(update) = updates.recv().await {
            self.report(update).await;
        }
    }

    async fn send_terminal(&mut self, event: DownloadProgressEvent) {
        if self.observer_gone {
            return;
        }
        match self.observer.send_timeout(event, TERMINAL_SEND_GRACE).await {
            Ok(()) => {}
            Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                warn!("Progress observer stalled, dropping the final event");
                self.observer_gone = true;
            }
            Err(mpsc::error::SendTimeoutError::Closed(_)) => {
                warn!("Progress observer went away before the final event");
                self.observer_gone = true;
            }
        }
    }

    async fn send(&mut self, event: DownloadProgressEvent) {
        if self.observer_gone {
            return;
        }
        // A dropped receiver only means nobody is watching
        if let Err(e) = self.observer.send(event).await {
            warn!("Progress observer went away: {}", e);
            self.observer_gone = true;
        }
    }
}
