//! Download session coordination: sessions, progress fan-out and workers

pub mod bus;
pub mod events;
pub mod fetcher;
pub mod formats;
pub mod registry;
pub mod session;
pub mod worker;
pub mod ytdlp;

// Re-exports for convenience
pub use bus::{ObserverHandle, ProgressBus, Subscription};
pub use events::ProgressEvent;
pub use fetcher::{FetchRequest, FetchedMedia, FormatDescriptor, MediaFetcher, RawProgress, VideoInfo};
pub use formats::{classify_formats, FormatTable, VideoInfoResponse};
pub use registry::SessionRegistry;
pub use session::{DownloadSession, NewSession, SessionState, SessionSummary};
pub use worker::{DownloadWorker, WorkerPool};
pub use ytdlp::YtDlpFetcher;
