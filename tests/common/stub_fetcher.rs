//! Scripted `MediaFetcher` for driving workers without yt-dlp
//!
//! The stub replays a list of steps (progress callbacks, sleeps, waits on a
//! latch the test releases) and then writes an output file of a chosen size
//! into the request destination.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use vidfetch::core::AppError;
use vidfetch::download::fetcher::{FetchRequest, FetchedMedia, FormatDescriptor, MediaFetcher, RawProgress, VideoInfo};

/// One-shot gate a blocking fetch can wait on until the test opens it
#[derive(Default)]
pub struct Latch {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Latch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn release(&self) {
        let mut open = self.open.lock().unwrap();
        *open = true;
        self.cv.notify_all();
    }

    pub fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cv.wait(open).unwrap();
        }
    }
}

/// What the stub does during `fetch`, in order
#[derive(Clone)]
pub enum Step {
    Progress(RawProgress),
    Sleep(Duration),
    WaitFor(Arc<Latch>),
}

/// Output the stub leaves behind once the script ran
#[derive(Debug, Clone)]
pub enum Output {
    /// Write `<stem>.<ext>` with this many bytes
    File { stem: String, ext: String, bytes: usize },
    /// Report `<stem>.<ext>` but write nothing
    Missing { stem: String, ext: String },
    /// Fail the transfer with this message
    Fail(String),
    /// Panic inside the blocking fetch
    Panic,
}

pub struct StubFetcher {
    pub info: Option<VideoInfo>,
    pub steps: Vec<Step>,
    pub output: Output,
    pub tools_available: bool,
    active: AtomicUsize,
    max_active: AtomicUsize,
    fetches: AtomicUsize,
    pub requests: Mutex<Vec<FetchRequest>>,
}

impl Default for StubFetcher {
    fn default() -> Self {
        Self {
            info: Some(sample_info()),
            steps: Vec::new(),
            output: Output::File {
                stem: "clip".to_string(),
                ext: "mp4".to_string(),
                bytes: 1024,
            },
            tools_available: true,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    pub fn without_info(mut self) -> Self {
        self.info = None;
        self
    }

    pub fn without_tools(mut self) -> Self {
        self.tools_available = false;
        self
    }

    /// Highest number of fetches that ran at the same time
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

/// `downloading` callback for `downloaded` of `total` bytes
pub fn progress(downloaded: u64, total: u64) -> Step {
    Step::Progress(RawProgress::Downloading {
        downloaded,
        total: Some(total),
        speed: Some(1_048_576.0),
        eta: Some(3),
        filename: Some("clip.mp4".to_string()),
    })
}

pub fn finished() -> Step {
    Step::Progress(RawProgress::Finished {
        filename: Some("clip.f137.mp4".to_string()),
    })
}

/// Video with one muxed, one video-only and one audio-only format
pub fn sample_info() -> VideoInfo {
    VideoInfo {
        title: "Sample Clip".to_string(),
        duration_seconds: Some(205),
        thumbnail: Some("https://img.example.com/t.jpg".to_string()),
        description: Some("A sample".to_string()),
        formats: vec![
            FormatDescriptor {
                format_id: "18".to_string(),
                container: "mp4".to_string(),
                video_codec: Some("avc1.42001E".to_string()),
                audio_codec: Some("mp4a.40.2".to_string()),
                width: Some(640),
                height: Some(360),
                fps: Some(25.0),
                bitrate: Some(500.0),
                approx_size_bytes: Some(12_000_000),
                note: Some("360p".to_string()),
            },
            FormatDescriptor {
                format_id: "137".to_string(),
                container: "mp4".to_string(),
                video_codec: Some("avc1.640028".to_string()),
                width: Some(1920),
                height: Some(1080),
                fps: Some(60.0),
                bitrate: Some(4400.0),
                approx_size_bytes: Some(110_000_000),
                ..Default::default()
            },
            FormatDescriptor {
                format_id: "140".to_string(),
                container: "m4a".to_string(),
                audio_codec: Some("mp4a.40.2".to_string()),
                bitrate: Some(129.0),
                approx_size_bytes: Some(3_300_000),
                note: Some("medium".to_string()),
                ..Default::default()
            },
        ],
    }
}

#[async_trait]
impl MediaFetcher for StubFetcher {
    fn name(&self) -> &str {
        "stub"
    }

    async fn lookup(&self, url: &str) -> Result<VideoInfo, AppError> {
        self.info
            .clone()
            .ok_or_else(|| AppError::Extraction(format!("Unsupported URL: {}", url)))
    }

    async fn check_tools(&self) -> Result<(), AppError> {
        if self.tools_available {
            Ok(())
        } else {
            Err(AppError::PreconditionFailed("ffmpeg is not available".to_string()))
        }
    }

    fn fetch(&self, request: &FetchRequest, on_progress: &mut dyn FnMut(RawProgress)) -> Result<FetchedMedia, AppError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        for step in &self.steps {
            match step {
                Step::Progress(raw) => on_progress(raw.clone()),
                Step::Sleep(duration) => std::thread::sleep(*duration),
                Step::WaitFor(latch) => latch.wait(),
            }
        }

        self.active.fetch_sub(1, Ordering::SeqCst);

        match &self.output {
            Output::File { stem, ext, bytes } => {
                let path = request.destination.join(format!("{}.{}", stem, ext));
                std::fs::write(&path, vec![0u8; *bytes])?;
                Ok(FetchedMedia {
                    stem: stem.clone(),
                    ext: ext.clone(),
                })
            }
            Output::Missing { stem, ext } => Ok(FetchedMedia {
                stem: stem.clone(),
                ext: ext.clone(),
            }),
            Output::Fail(message) => Err(AppError::Transfer(message.clone())),
            Output::Panic => panic!("stub fetcher panicked"),
        }
    }
}
