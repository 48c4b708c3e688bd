//! Quality options derived from a resolved media descriptor
//!
//! Audio choices are offered as labelled variants and map back to a concrete
//! format id. Video choices are offered as heights and become an upper bound
//! that the download engine resolves at fetch time.

use crate::extractor::{MediaDescriptor, Variant};
use crate::utils::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// What the deliverable should be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    /// Audio transcoded to a standard codec
    Audio,
    /// Video muxed into a standard container
    Video,
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audio" | "mp3" => Ok(MediaKind::Audio),
            "video" | "mp4" => Ok(MediaKind::Video),
            other => Err(format!("unknown media kind '{}' (expected audio or video)", other)),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// A resolved user choice, consumed by exactly one download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualitySelection {
    /// A concrete variant
    Format(String),
    /// Best video at or below this height
    MaxHeight(u32),
    /// Whatever the engine considers best
    Best,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioOption {
    pub label: String,
    pub format_id: String,
    pub bitrate_kbps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeightOption {
    pub height: u32,
    pub label: String,
}

fn audio_label(variant: &Variant) -> String {
    let ext = variant
        .extension
        .as_deref()
        .map(str::to_uppercase)
        .unwrap_or_else(|| "?".to_string());

    match variant.audio_bitrate_kbps {
        Some(kbps) => format!("{:.0} kbps ({})", kbps, ext),
        None => format!("Unknown ({})", ext),
    }
}

/// Audio-only variants, best bitrate first.
///
/// Unknown bitrates sort as 0 and ties keep the source order. A label that
/// would repeat gets the format id appended so every label maps to exactly
/// one variant.
pub fn audio_options(descriptor: &MediaDescriptor) -> Vec<AudioOption> {
    let mut audio: Vec<&Variant> = descriptor.audio_variants().collect();
    audio.sort_by(|a, b| {
        let a = a.audio_bitrate_kbps.unwrap_or(0.0);
        let b = b.audio_bitrate_kbps.unwrap_or(0.0);
        b.total_cmp(&a)
    });

    let mut seen = HashSet::new();
    audio
        .into_iter()
        .map(|variant| {
            let mut label = audio_label(variant);
            if !seen.insert(label.clone()) {
                label = format!("{} [{}]", label, variant.format_id);
                seen.insert(label.clone());
            }
            AudioOption {
                label,
                format_id: variant.format_id.clone(),
                bitrate_kbps: variant.audio_bitrate_kbps,
            }
        })
        .collect()
}

/// Distinct heights of video-capable variants, tallest first
pub fn video_heights(descriptor: &MediaDescriptor) -> Vec<HeightOption> {
    let heights: BTreeSet<u32> = descriptor
        .video_variants()
        .filter_map(|v| v.video_height_px)
        .filter(|h| *h > 0)
        .collect();

    heights
        .into_iter()
        .rev()
        .map(|height| HeightOption {
            height,
            label: format!("{}p", height),
        })
        .collect()
}

/// Map an audio choice (a label, or a bare format id) back to its variant.
///
/// No choice, or nothing to choose from, falls back to [`QualitySelection::Best`].
pub fn resolve_audio_choice(
    options: &[AudioOption],
    choice: Option<&str>,
) -> Result<QualitySelection, PipelineError> {
    let Some(choice) = choice.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(QualitySelection::Best);
    };

    if options.is_empty() {
        warn!("No audio options to match '{}' against, using best audio", choice);
        return Ok(QualitySelection::Best);
    }

    options
        .iter()
        .find(|o| o.label == choice)
        .or_else(|| options.iter().find(|o| o.format_id == choice))
        .map(|o| {
            debug!("Audio choice '{}' -> format {}", choice, o.format_id);
            QualitySelection::Format(o.format_id.clone())
        })
        .ok_or_else(|| PipelineError::Selection(format!("'{}' is not an offered audio quality", choice)))
}

/// Turn a height choice (`"720"` or `"720p"`) into an upper bound.
///
/// Without a choice the tallest offered height is used, and without any
/// offered heights `default_height`.
pub fn resolve_video_choice(
    heights: &[HeightOption],
    choice: Option<&str>,
    default_height: u32,
) -> Result<QualitySelection, PipelineError> {
    let Some(choice) = choice.map(str::trim).filter(|c| !c.is_empty()) else {
        let height = heights.first().map(|h| h.height).unwrap_or(default_height);
        return Ok(QualitySelection::MaxHeight(height));
    };

    let digits = choice.strip_suffix(['p', 'P']).unwrap_or(choice);
    match digits.parse::<u32>() {
        Ok(height) if height > 0 => Ok(QualitySelection::MaxHeight(height)),
        _ => Err(PipelineError::Selection(format!(
            "'{}' is not a valid video height",
            choice
        ))),
    }
}

/// Build the engine's format-selector expression for a choice
pub fn format_selector(kind: MediaKind, selection: &QualitySelection) -> Result<String, PipelineError> {
    let selector = match (kind, selection) {
        (MediaKind::Audio, QualitySelection::Format(id)) => id.clone(),
        (MediaKind::Audio, QualitySelection::Best) => "bestaudio/best".to_string(),
        (MediaKind::Audio, QualitySelection::MaxHeight(_)) => {
            return Err(PipelineError::Selection(
                "a height limit does not apply to audio downloads".to_string(),
            ))
        }
        (MediaKind::Video, QualitySelection::MaxHeight(h)) => {
            format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]")
        }
        (MediaKind::Video, QualitySelection::Best) => "bestvideo+bestaudio/best".to_string(),
        (MediaKind::Video, QualitySelection::Format(id)) => format!("{id}+bestaudio/{id}"),
    };
    Ok(selector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::VariantKind;

    fn audio(id: &str, kbps: Option<f64>, ext: &str) -> Variant {
        Variant {
            format_id: id.to_string(),
            kind: VariantKind::AudioOnly,
            extension: Some(ext.to_string()),
            audio_bitrate_kbps: kbps,
            video_height_px: None,
            has_audio: true,
        }
    }

    fn video(id: &str, height: Option<u32>) -> Variant {
        Variant {
            format_id: id.to_string(),
            kind: VariantKind::VideoCapable,
            extension: Some("mp4".to_string()),
            audio_bitrate_kbps: None,
            video_height_px: height,
            has_audio: false,
        }
    }

    fn descriptor(variants: Vec<Variant>) -> MediaDescriptor {
        MediaDescriptor {
            source_url: "https://example.com/v".to_string(),
            title: None,
            uploader: None,
            upload_date: None,
            thumbnail_url: None,
            duration_secs: None,
            variants,
        }
    }

    #[test]
    fn test_audio_options_order_and_labels() {
        let d = descriptor(vec![
            audio("a", Some(128.0), "m4a"),
            audio("b", None, "webm"),
            audio("c", Some(256.0), "m4a"),
        ]);
        let labels: Vec<String> = audio_options(&d).into_iter().map(|o| o.label).collect();
        assert_eq!(labels, ["256 kbps (M4A)", "128 kbps (M4A)", "Unknown (WEBM)"]);
    }

    #[test]
    fn test_audio_options_skip_video() {
        let d = descriptor(vec![video("137", Some(1080)), audio("140", Some(129.4), "m4a")]);
        let options = audio_options(&d);
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].label, "129 kbps (M4A)");
        assert_eq!(options[0].format_id, "140");
    }

    #[test]
    fn test_duplicate_labels_are_disambiguated() {
        let d = descriptor(vec![audio("249", Some(50.0), "webm"), audio("250", Some(50.0), "webm")]);
        let options = audio_options(&d);
        assert_eq!(options[0].label, "50 kbps (WEBM)");
        assert_eq!(options[1].label, "50 kbps (WEBM) [250]");

        let selection = resolve_audio_choice(&options, Some(&options[1].label)).unwrap();
        assert_eq!(selection, QualitySelection::Format("250".to_string()));
    }

    #[test]
    fn test_missing_extension_label() {
        let mut variant = audio("x", None, "");
        variant.extension = None;
        assert_eq!(audio_label(&variant), "Unknown (?)");
    }

    #[test]
    fn test_video_heights_distinct_descending() {
        let d = descriptor(vec![
            video("1", Some(720)),
            video("2", Some(1080)),
            video("3", None),
            video("4", Some(720)),
            video("5", Some(480)),
            video("6", Some(0)),
            audio("7", Some(128.0), "m4a"),
        ]);
        let heights: Vec<u32> = video_heights(&d).iter().map(|h| h.height).collect();
        assert_eq!(heights, [1080, 720, 480]);
        assert_eq!(video_heights(&d)[1].label, "720p");
    }

    #[test]
    fn test_empty_descriptor_yields_empty_options() {
        let d = descriptor(Vec::new());
        assert!(audio_options(&d).is_empty());
        assert!(video_heights(&d).is_empty());
        assert_eq!(resolve_audio_choice(&[], None).unwrap(), QualitySelection::Best);
        assert_eq!(
            resolve_audio_choice(&[], Some("128 kbps (M4A)")).unwrap(),
            QualitySelection::Best
        );
        assert_eq!(
            resolve_video_choice(&[], None, 1080).unwrap(),
            QualitySelection::MaxHeight(1080)
        );
    }

    #[test]
    fn test_resolve_audio_choice() {
        let d = descriptor(vec![audio("140", Some(128.0), "m4a"), audio("251", Some(160.0), "webm")]);
        let options = audio_options(&d);

        assert_eq!(
            resolve_audio_choice(&options, Some("128 kbps (M4A)")).unwrap(),
            QualitySelection::Format("140".to_string())
        );
        assert_eq!(
            resolve_audio_choice(&options, Some("251")).unwrap(),
            QualitySelection::Format("251".to_string())
        );
        assert_eq!(resolve_audio_choice(&options, Some("  ")).unwrap(), QualitySelection::Best);
        assert!(matches!(
            resolve_audio_choice(&options, Some("999 kbps (FLAC)")),
            Err(PipelineError::Selection(_))
        ));
    }

    #[test]
    fn test_resolve_video_choice() {
        let heights = vec![
            HeightOption { height: 1080, label: "1080p".into() },
            HeightOption { height: 720, label: "720p".into() },
        ];
        assert_eq!(
            resolve_video_choice(&heights, Some("720p"), 1080).unwrap(),
            QualitySelection::MaxHeight(720)
        );
        assert_eq!(
            resolve_video_choice(&heights, Some("480"), 1080).unwrap(),
            QualitySelection::MaxHeight(480)
        );
        assert_eq!(
            resolve_video_choice(&heights, None, 360).unwrap(),
            QualitySelection::MaxHeight(1080)
        );
        assert!(resolve_video_choice(&heights, Some("0p"), 1080).is_err());
        assert!(resolve_video_choice(&heights, Some("hd"), 1080).is_err());
    }

    #[test]
    fn test_format_selector() {
        assert_eq!(
            format_selector(MediaKind::Video, &QualitySelection::MaxHeight(720)).unwrap(),
            "bestvideo[height<=720]+bestaudio/best[height<=720]"
        );
        assert_eq!(
            format_selector(MediaKind::Audio, &QualitySelection::Best).unwrap(),
            "bestaudio/best"
        );
        assert_eq!(
            format_selector(MediaKind::Audio, &QualitySelection::Format("140".into())).unwrap(),
            "140"
        );
        assert_eq!(
            format_selector(MediaKind::Video, &QualitySelection::Format("137".into())).unwrap(),
            "137+bestaudio/137"
        );
        assert!(matches!(
            format_selector(MediaKind::Audio, &QualitySelection::MaxHeight(720)),
            Err(PipelineError::Selection(_))
        ));
    }

    #[test]
    fn test_media_kind_parse() {
        assert_eq!("MP3".parse::<MediaKind>().unwrap(), MediaKind::Audio);
        assert_eq!("video".parse::<MediaKind>().unwrap(), MediaKind::Video);
        assert!("gif".parse::<MediaKind>().is_err());
    }
}
