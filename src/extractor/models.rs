//! Data structures for extracted media information

use serde::{Deserialize, Serialize};

/// Raw media information as reported by the extraction backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub id: String,
    pub title: Option<String>,
    #[serde(default, alias = "webpage_url")]
    pub url: String,
    #[serde(default)]
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
    pub uploader: Option<String>,
    pub upload_date: Option<String>,
    #[serde(default)]
    pub formats: Vec<Format>,
    pub extractor: Option<String>,
}

/// One raw encoded stream offered by the source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Format {
    pub format_id: String,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub format_note: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub tbr: Option<f64>, // Total bitrate
    pub abr: Option<f64>, // Audio bitrate
}

impl Format {
    /// `Some(true)` when the codec field names a real codec, `Some(false)` for
    /// the literal `"none"`, `None` when the backend did not say.
    fn codec_present(codec: &Option<String>) -> Option<bool> {
        codec
            .as_deref()
            .map(|c| !c.is_empty() && c != "none")
    }

    pub fn has_video(&self) -> Option<bool> {
        Self::codec_present(&self.vcodec)
    }

    pub fn has_audio(&self) -> Option<bool> {
        Self::codec_present(&self.acodec)
    }
}
