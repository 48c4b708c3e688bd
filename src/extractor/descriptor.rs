//! Normalized media descriptors handed to the rest of the pipeline

use crate::extractor::models::{Format, VideoInfo};
use crate::utils::format::format_upload_date;
use serde::{Deserialize, Serialize};

/// Whether a variant can only ever produce audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariantKind {
    AudioOnly,
    VideoCapable,
}

/// One specific encoded stream offered by the source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub format_id: String,
    pub kind: VariantKind,
    pub extension: Option<String>,
    pub audio_bitrate_kbps: Option<f64>,
    /// Always `None` for `AudioOnly`
    pub video_height_px: Option<u32>,
    /// Video variants without audio need a separate audio merge
    pub has_audio: bool,
}

impl Variant {
    /// Classify a raw format, dropping records that carry neither usable
    /// video nor audio (storyboards, thumbnails).
    pub fn from_format(format: &Format) -> Option<Self> {
        let kind = match (format.has_video(), format.has_audio()) {
            (Some(true), _) => VariantKind::VideoCapable,
            (Some(false), Some(true)) => VariantKind::AudioOnly,
            (Some(false), _) => return None,
            // Codec unknown: trust the height if there is one
            (None, _) if format.height.is_some() => VariantKind::VideoCapable,
            (None, Some(true)) => VariantKind::AudioOnly,
            (None, _) => return None,
        };

        let (video_height_px, has_audio) = match kind {
            VariantKind::AudioOnly => (None, true),
            VariantKind::VideoCapable => (format.height, format.has_audio().unwrap_or(false)),
        };

        Some(Self {
            format_id: format.format_id.clone(),
            kind,
            extension: format.ext.clone().filter(|e| !e.is_empty()),
            audio_bitrate_kbps: format.abr.filter(|abr| abr.is_finite() && *abr >= 0.0),
            video_height_px,
            has_audio,
        })
    }
}

/// Canonical description of a resolved media item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub source_url: String,
    pub title: Option<String>,
    pub uploader: Option<String>,
    /// Display-formatted (`Jan 15, 2023`) when the backend gave `YYYYMMDD`
    pub upload_date: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_secs: Option<f64>,
    pub variants: Vec<Variant>,
}

impl MediaDescriptor {
    pub fn from_info(source_url: &str, info: VideoInfo) -> Self {
        let variants = info.formats.iter().filter_map(Variant::from_format).collect();

        Self {
            source_url: source_url.to_string(),
            title: info.title,
            uploader: info.uploader,
            upload_date: info.upload_date.as_deref().map(format_upload_date),
            thumbnail_url: info.thumbnail,
            duration_secs: info.duration,
            variants,
        }
    }

    pub fn audio_variants(&self) -> impl Iterator<Item = &Variant> {
        self.variants
            .iter()
            .filter(|v| v.kind == VariantKind::AudioOnly)
    }

    pub fn video_variants(&self) -> impl Iterator<Item = &Variant> {
        self.variants
            .iter()
            .filter(|v| v.kind == VariantKind::VideoCapable)
    }
}
