//! Progress events pushed to every connected observer.
//!
//! Serialized as flat JSON objects discriminated by `status`, e.g.
//! `{"status":"downloading","percent":42.0,"speed":1048576.0,"eta":12,...}`.

use serde::{Deserialize, Serialize};

/// Message attached to the `converting` event.
pub const CONVERTING_MESSAGE: &str = "Converting video format...";

/// One progress notification for a download session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// Bytes are flowing
    Downloading {
        /// Download progress in percent (0-100), 0 when the total is unknown
        percent: f64,
        /// Download speed in bytes per second
        speed: Option<f64>,
        /// Estimated time remaining in seconds
        eta: Option<u64>,
        /// File currently being written
        filename: Option<String>,
        download_id: String,
    },
    /// Raw transfer finished, post-processing (merge/convert) is running
    Converting {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        download_id: Option<String>,
    },
    /// Output verified on disk
    Completed {
        /// Video title, as used for the output file name
        title: String,
        path: String,
        download_id: String,
    },
    /// Setup, transfer or verification failed
    Error { error: String, download_id: String },
    Paused { download_id: String },
    Resumed { download_id: String },
}

impl ProgressEvent {
    /// Builds a `downloading` event, deriving the percentage from byte counts.
    ///
    /// The percentage is `downloaded / total * 100` when the total is known
    /// and positive, otherwise `0`.
    pub fn downloading(
        download_id: &str,
        downloaded: u64,
        total: Option<u64>,
        speed: Option<f64>,
        eta: Option<u64>,
        filename: Option<String>,
    ) -> Self {
        let percent = match total {
            Some(total) if total > 0 => downloaded as f64 / total as f64 * 100.0,
            _ => 0.0,
        };
        ProgressEvent::Downloading {
            percent,
            speed,
            eta,
            filename,
            download_id: download_id.to_string(),
        }
    }

    pub fn converting(download_id: &str) -> Self {
        ProgressEvent::Converting {
            message: CONVERTING_MESSAGE.to_string(),
            download_id: Some(download_id.to_string()),
        }
    }

    /// Session id this event belongs to, if any.
    pub fn download_id(&self) -> Option<&str> {
        match self {
            ProgressEvent::Downloading { download_id, .. }
            | ProgressEvent::Completed { download_id, .. }
            | ProgressEvent::Error { download_id, .. }
            | ProgressEvent::Paused { download_id }
            | ProgressEvent::Resumed { download_id } => Some(download_id),
            ProgressEvent::Converting { download_id, .. } => download_id.as_deref(),
        }
    }

    /// `completed` and `error` end a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Completed { .. } | ProgressEvent::Error { .. })
    }

    /// Wire name of the variant (the `status` field).
    pub fn status(&self) -> &'static str {
        match self {
            ProgressEvent::Downloading { .. } => "downloading",
            ProgressEvent::Converting { .. } => "converting",
            ProgressEvent::Completed { .. } => "completed",
            ProgressEvent::Error { .. } => "error",
            ProgressEvent::Paused { .. } => "paused",
            ProgressEvent::Resumed { .. } => "resumed",
        }
    }
}
