//! Turns the extractor's raw format list into the table shown to the user.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::core::utils::{format_filesize, format_hms};
use crate::download::fetcher::{FormatDescriptor, VideoInfo};

/// One selectable row of the format table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatOption {
    /// Id to send back with a download request (`v+a` for merged pairs)
    pub format_id: String,
    pub ext: String,
    /// Human readable size, e.g. `12.3 MB`
    pub filesize: String,
    /// Total bitrate in kbit/s, 0 when unknown
    pub tbr: f64,
    /// Codec name or `none`
    pub vcodec: String,
    pub acodec: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// `1080p`, `720p 60fps`, or the provider note for audio
    pub quality_label: String,
}

/// Formats grouped by what they contain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatTable {
    /// Muxed formats and video-only formats paired with the best audio track
    pub combined: Vec<FormatOption>,
    pub video: Vec<FormatOption>,
    pub audio: Vec<FormatOption>,
}

/// Body of the video info endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfoResponse {
    pub title: String,
    /// `H:MM:SS`
    pub duration: String,
    pub thumbnail: String,
    pub description: String,
    pub formats: FormatTable,
}

impl VideoInfoResponse {
    pub fn from_info(info: &VideoInfo) -> Self {
        Self {
            title: info.title.clone(),
            duration: format_hms(info.duration_seconds.unwrap_or(0)),
            thumbnail: info.thumbnail.clone().unwrap_or_default(),
            description: info.description.clone().unwrap_or_default(),
            formats: classify_formats(&info.formats),
        }
    }
}

fn quality_label(format: &FormatDescriptor) -> String {
    match format.height.filter(|h| *h > 0) {
        Some(height) => {
            let fps = format.fps.unwrap_or(0.0);
            if fps > 30.0 {
                format!("{}p {}fps", height, fps as u32)
            } else {
                format!("{}p", height)
            }
        }
        None => format.note.clone().unwrap_or_else(|| "N/A".to_string()),
    }
}

fn option_for(format: &FormatDescriptor, size: u64) -> FormatOption {
    FormatOption {
        format_id: format.format_id.clone(),
        ext: format.container.clone(),
        filesize: format_filesize(size),
        tbr: format.bitrate.unwrap_or(0.0),
        vcodec: format.video_codec.clone().unwrap_or_else(|| "none".to_string()),
        acodec: format.audio_codec.clone().unwrap_or_else(|| "none".to_string()),
        width: format.width.unwrap_or(0),
        height: format.height.unwrap_or(0),
        fps: format.fps.unwrap_or(0.0),
        quality_label: quality_label(format),
    }
}

/// Best audio-only track: largest known size, then highest bitrate.
fn best_audio(formats: &[FormatDescriptor]) -> Option<&FormatDescriptor> {
    formats.iter().filter(|f| f.is_audio_only()).max_by(|a, b| {
        a.approx_size_bytes
            .unwrap_or(0)
            .cmp(&b.approx_size_bytes.unwrap_or(0))
            .then_with(|| a.bitrate.unwrap_or(0.0).total_cmp(&b.bitrate.unwrap_or(0.0)))
    })
}

/// Descending by height, then fps, then bitrate.
fn by_quality_desc(a: &FormatOption, b: &FormatOption) -> Ordering {
    b.height
        .cmp(&a.height)
        .then_with(|| b.fps.total_cmp(&a.fps))
        .then_with(|| b.tbr.total_cmp(&a.tbr))
}

/// Classifies formats into combined, video-only and audio-only lists.
///
/// Formats without any codec or without a known, non-zero size are skipped.
/// Every video-only format is additionally offered as a `video+audio` pair
/// with the best audio-only track, its size being the sum of both.
pub fn classify_formats(formats: &[FormatDescriptor]) -> FormatTable {
    let audio_track = best_audio(formats);
    let mut table = FormatTable::default();

    for format in formats {
        let size = match format.approx_size_bytes {
            Some(size) if size > 0 => size,
            _ => continue,
        };

        match (format.has_video(), format.has_audio()) {
            (false, false) => continue,
            (true, true) => table.combined.push(option_for(format, size)),
            (true, false) => {
                let video = option_for(format, size);
                if let Some(audio) = audio_track {
                    let mut pair = video.clone();
                    pair.format_id = format!("{}+{}", format.format_id, audio.format_id);
                    pair.acodec = audio.audio_codec.clone().unwrap_or_else(|| "none".to_string());
                    pair.filesize = format_filesize(size + audio.approx_size_bytes.unwrap_or(0));
                    table.combined.push(pair);
                }
                table.video.push(video);
            }
            (false, true) => table.audio.push(option_for(format, size)),
        }
    }

    table.combined.sort_by(by_quality_desc);
    table.video.sort_by(by_quality_desc);
    table.audio.sort_by(by_quality_desc);

    log::debug!(
        "Classified {} formats: {} combined, {} video, {} audio",
        formats.len(),
        table.combined.len(),
        table.video.len(),
        table.audio.len()
    );
    table
}
