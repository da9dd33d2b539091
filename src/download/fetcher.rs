//! Contract for the external program that extracts and downloads media.
//!
//! The coordinator never parses provider pages or muxes streams itself; it
//! hands a URL and a format selector to a [`MediaFetcher`] and consumes the
//! raw progress callbacks it produces.

use crate::core::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One encode of a video as reported by the extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub format_id: String,
    /// File extension of this encode (mp4, webm, m4a, ...)
    pub container: String,
    /// Video codec, `None` for audio-only encodes
    pub video_codec: Option<String>,
    /// Audio codec, `None` for video-only encodes
    pub audio_codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    /// Total bitrate in kbit/s
    pub bitrate: Option<f64>,
    /// Exact or approximate size in bytes
    pub approx_size_bytes: Option<u64>,
    /// Free-form provider label ("medium", "DASH audio", ...)
    pub note: Option<String>,
}

impl FormatDescriptor {
    pub fn has_video(&self) -> bool {
        self.video_codec.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }

    /// Audio without video.
    pub fn is_audio_only(&self) -> bool {
        self.has_audio() && !self.has_video()
    }
}

/// Metadata of a video and all its encodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    pub duration_seconds: Option<u64>,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    pub formats: Vec<FormatDescriptor>,
}

/// What to download and where.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    /// Format id chosen by the user; `v+a` asks for a merged pair
    pub format_selector: String,
    pub destination: PathBuf,
}

/// Raw progress notification from the fetcher.
#[derive(Debug, Clone, PartialEq)]
pub enum RawProgress {
    Downloading {
        downloaded: u64,
        total: Option<u64>,
        /// Bytes per second
        speed: Option<f64>,
        /// Seconds remaining
        eta: Option<u64>,
        filename: Option<String>,
    },
    /// Transfer done, post-processing (merge or conversion) follows
    Finished { filename: Option<String> },
}

/// Name of the produced media, relative to the request destination.
///
/// The file is expected at `<destination>/<stem>.<ext>`, or at
/// `<destination>/<stem>.mp4` after conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMedia {
    pub stem: String,
    pub ext: String,
}

/// External media extractor/downloader.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Human-readable name of the backend
    fn name(&self) -> &str;

    /// Fetch title, duration and the list of available formats.
    ///
    /// Fails with [`AppError::Extraction`] for unreachable or unsupported URLs.
    async fn lookup(&self, url: &str) -> Result<VideoInfo, AppError>;

    /// Verify that the tools needed for merging/conversion are installed.
    async fn check_tools(&self) -> Result<(), AppError>;

    /// Download and post-process the media. Blocks the calling thread until
    /// the transfer ends; `on_progress` is invoked on that same thread.
    fn fetch(&self, request: &FetchRequest, on_progress: &mut dyn FnMut(RawProgress)) -> Result<FetchedMedia, AppError>;
}
