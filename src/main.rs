//! mediagrab - fetch a single converted media file from a URL
//!
//! Resolves the URL, shows the available qualities, downloads the chosen one
//! with live progress and saves the result.

use anyhow::Result;
use clap::Parser;
use mediagrab::catalog::{self, MediaKind};
use mediagrab::downloader::{DownloadOrchestrator, YtDlpEngine};
use mediagrab::extractor::{MediaDescriptor, SourceResolver, YtDlpExtractor};
use mediagrab::utils::PipelineSettings;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "mediagrab", version, about = "Download audio or video from a media URL")]
struct Args {
    /// URL of the video or audio page
    url: String,

    /// audio (transcoded) or video (merged)
    #[arg(long, default_value = "video")]
    kind: MediaKind,

    /// Audio label / format id, or video height such as 720p
    #[arg(long)]
    quality: Option<String>,

    /// Only show metadata and available qualities
    #[arg(long)]
    list: bool,

    /// Where to save the file (defaults to the Downloads folder)
    #[arg(long)]
    output: Option<PathBuf>,

    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt::init();

    let settings = match &args.config {
        Some(path) => PipelineSettings::load(path)?,
        None => PipelineSettings::default(),
    };

    let extractor = YtDlpExtractor::with_path(settings.ytdlp_path.as_deref())?;
    let engine = YtDlpEngine::new(extractor.ytdlp_path());
    let resolver = SourceResolver::new(Arc::new(extractor), &settings);
    let orchestrator = DownloadOrchestrator::new(Arc::new(engine), &settings);

    println!("Fetching media info...");
    let descriptor = resolver.resolve(&args.url).await?;
    print_descriptor(&descriptor);

    let selection = match args.kind {
        MediaKind::Audio => {
            let options = catalog::audio_options(&descriptor);
            println!("Audio qualities:");
            for option in &options {
                println!("  {}  [{}]", option.label, option.format_id);
            }
            catalog::resolve_audio_choice(&options, args.quality.as_deref())?
        }
        MediaKind::Video => {
            let heights = catalog::video_heights(&descriptor);
            println!("Video qualities:");
            for height in &heights {
                println!("  {}", height.label);
            }
            catalog::resolve_video_choice(
                &heights,
                args.quality.as_deref(),
                settings.default_video_height,
            )?
        }
    };

    if args.list {
        return Ok(());
    }

    // Spawn progress reporter
    let (progress_tx, mut progress_rx) = mpsc::channel(settings.progress_capacity);
    let printer = tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            println!("{}", event);
        }
    });

    let result = orchestrator
        .download(&args.url, args.kind, selection, progress_tx)
        .await;
    let _ = printer.await;
    let file = result?;

    let out_dir = args
        .output
        .or_else(dirs::download_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    tokio::fs::create_dir_all(&out_dir).await?;
    let path = out_dir.join(&file.file_name);
    tokio::fs::write(&path, &file.bytes).await?;

    println!("Download completed successfully! Saved to {}", path.display());
    Ok(())
}

fn print_descriptor(descriptor: &MediaDescriptor) {
    println!("Title: {}", descriptor.title.as_deref().unwrap_or("Unknown"));
    println!(
        "Uploaded by {} on {}",
        descriptor.uploader.as_deref().unwrap_or("Unknown"),
        descriptor.upload_date.as_deref().unwrap_or("Unknown")
    );
    if let Some(thumbnail) = &descriptor.thumbnail_url {
        println!("Thumbnail: {}", thumbnail);
    }
    if let Some(duration) = descriptor.duration_secs {
        println!("Duration: {:.0}s", duration);
    }
}
