use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration constants for the server
/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// ffmpeg binary used for merging and converting downloads
/// Read from FFMPEG_BIN environment variable
/// Default: ffmpeg (resolved through PATH)
pub static FFMPEG_BIN: Lazy<String> = Lazy::new(|| env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string()));

/// Default download folder
/// Read from DOWNLOAD_DIR environment variable
/// Supports tilde (~) expansion for home directory
/// Default: downloads (relative to the working directory)
pub static DOWNLOAD_DIR: Lazy<String> = Lazy::new(|| {
    let raw = env::var("DOWNLOAD_DIR").unwrap_or_else(|_| "downloads".to_string());
    shellexpand::tilde(&raw).to_string()
});

/// Directory holding index.html and the static assets of the front-end
/// Read from STATIC_DIR environment variable
/// Default: static
pub static STATIC_DIR: Lazy<String> = Lazy::new(|| env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: vidfetch.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "vidfetch.log".to_string()));

/// Log level for both console and file output
/// Read from LOG_LEVEL environment variable (error, warn, info, debug, trace)
/// Default: info
pub static LOG_LEVEL: Lazy<String> = Lazy::new(|| env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));

/// Address the web server binds to
/// Read from WEB_HOST environment variable
/// Default: 0.0.0.0 (reachable from the local network)
pub static WEB_HOST: Lazy<String> = Lazy::new(|| env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()));

/// Port the web server listens on
/// Read from WEB_PORT environment variable
/// Default: 8080
pub static WEB_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080)
});

/// Number of transfers allowed to run at the same time
/// Read from WORKER_POOL_SIZE environment variable
/// Default: worker::POOL_SIZE
pub static WORKER_POOL_SIZE: Lazy<usize> = Lazy::new(|| {
    env::var("WORKER_POOL_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|n: &usize| *n > 0)
        .unwrap_or(worker::POOL_SIZE)
});

/// Directories offered to the user as download destinations.
pub fn default_download_paths() -> Vec<PathBuf> {
    vec![PathBuf::from(DOWNLOAD_DIR.as_str())]
}

/// Download worker configuration
pub mod worker {
    use super::Duration;

    /// Maximum number of concurrent transfers
    pub const POOL_SIZE: usize = 4;

    /// How long a progress callback may wait to hand an event to the
    /// event loop before the event is dropped (in seconds)
    pub const HANDOFF_TIMEOUT_SECS: u64 = 5;

    /// Capacity of the per-worker channel between the transfer thread and its forwarder
    pub const EVENT_BUFFER: usize = 64;

    /// Hand-off timeout duration
    pub fn handoff_timeout() -> Duration {
        Duration::from_secs(HANDOFF_TIMEOUT_SECS)
    }
}

/// Progress bus configuration
pub mod bus {
    /// Number of serialized events an observer may lag behind before it
    /// starts missing events
    pub const OBSERVER_BUFFER: usize = 256;
}

/// yt-dlp invocation configuration
pub mod ytdlp {
    use super::Duration;

    /// Timeout for metadata lookups (in seconds)
    pub const LOOKUP_TIMEOUT_SECS: u64 = 90;

    /// Socket timeout passed to yt-dlp (in seconds)
    pub const SOCKET_TIMEOUT_SECS: u64 = 30;

    /// Retries passed to yt-dlp
    pub const RETRIES: u32 = 3;

    /// Container every download is merged/converted into
    pub const OUTPUT_CONTAINER: &str = "mp4";

    /// Browser user agent sent with metadata requests
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    /// Lookup timeout duration
    pub fn lookup_timeout() -> Duration {
        Duration::from_secs(LOOKUP_TIMEOUT_SECS)
    }
}

/// External tool probing configuration
pub mod tools {
    use super::Duration;

    /// Timeout for `<tool> -version` probes (in seconds)
    pub const PROBE_TIMEOUT_SECS: u64 = 10;

    /// Timeout for the native folder picker (in seconds)
    pub const FOLDER_PICKER_TIMEOUT_SECS: u64 = 300;

    /// Probe timeout duration
    pub fn probe_timeout() -> Duration {
        Duration::from_secs(PROBE_TIMEOUT_SECS)
    }

    /// Folder picker timeout duration
    pub fn folder_picker_timeout() -> Duration {
        Duration::from_secs(FOLDER_PICKER_TIMEOUT_SECS)
    }
}
