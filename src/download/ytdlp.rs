//! [`MediaFetcher`] backed by the `yt-dlp` command-line program.
//!
//! Lookups run `yt-dlp -J` and parse the JSON dump. Downloads run yt-dlp with a
//! machine-readable progress template and translate each line into
//! [`RawProgress`]; merging and conversion to mp4 are delegated to ffmpeg.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use tokio::process::Command as TokioCommand;

use crate::core::config;
use crate::core::error::AppError;
use crate::core::process::{probe_tool, run_with_timeout};
use crate::download::fetcher::{FetchRequest, FetchedMedia, FormatDescriptor, MediaFetcher, RawProgress, VideoInfo};

/// Prefix of the lines produced by our `--progress-template`.
const PROGRESS_PREFIX: &str = "[vidfetch]";
/// Prefix of the line printed right before the download starts.
const INFO_PREFIX: &str = "[vidfetch-info]";
/// Post-processor banners that mean the raw transfer is over.
const POSTPROCESSOR_PREFIXES: &[&str] = &["[Merger]", "[VideoConvertor]", "[ExtractAudio]"];
/// How many stderr lines are kept for error reporting.
const STDERR_TAIL: usize = 200;

/// Progress template fields, tab-separated:
/// status, downloaded, total, total estimate, speed, eta, filename.
fn progress_template() -> String {
    format!(
        "download:{}%(progress.status)s\t%(progress.downloaded_bytes)s\t%(progress.total_bytes)s\t\
         %(progress.total_bytes_estimate)s\t%(progress.speed)s\t%(progress.eta)s\t%(progress.filename)s",
        PROGRESS_PREFIX
    )
}

/// Runs the `yt-dlp` binary configured by `YTDL_BIN`.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    ytdl_bin: String,
    ffmpeg_bin: String,
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlpFetcher {
    pub fn new() -> Self {
        Self::with_binaries(config::YTDL_BIN.clone(), config::FFMPEG_BIN.clone())
    }

    pub fn with_binaries(ytdl_bin: impl Into<String>, ffmpeg_bin: impl Into<String>) -> Self {
        Self {
            ytdl_bin: ytdl_bin.into(),
            ffmpeg_bin: ffmpeg_bin.into(),
        }
    }

    /// Installed yt-dlp version, used for the startup log.
    pub async fn version(&self) -> Option<String> {
        let mut cmd = TokioCommand::new(&self.ytdl_bin);
        cmd.arg("--version");
        match run_with_timeout(&mut cmd, config::tools::probe_timeout()).await {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            }
            Ok(output) => {
                log::warn!("{} --version exited with {}", self.ytdl_bin, output.status);
                None
            }
            Err(e) => {
                log::warn!("Failed to run {} --version: {}", self.ytdl_bin, e);
                None
            }
        }
    }

    fn download_args(&self, request: &FetchRequest) -> Vec<String> {
        let output_template = request.destination.join("%(title)s.%(ext)s");
        vec![
            "--newline".to_string(),
            "--progress".to_string(),
            "--no-simulate".to_string(),
            "--no-playlist".to_string(),
            "--progress-template".to_string(),
            progress_template(),
            "--print".to_string(),
            format!("before_dl:{}%(filename)s", INFO_PREFIX),
            "--format".to_string(),
            build_format_arg(&request.format_selector),
            "--merge-output-format".to_string(),
            config::ytdlp::OUTPUT_CONTAINER.to_string(),
            "--recode-video".to_string(),
            config::ytdlp::OUTPUT_CONTAINER.to_string(),
            "--ffmpeg-location".to_string(),
            self.ffmpeg_bin.clone(),
            "--user-agent".to_string(),
            config::ytdlp::USER_AGENT.to_string(),
            "--socket-timeout".to_string(),
            config::ytdlp::SOCKET_TIMEOUT_SECS.to_string(),
            "--retries".to_string(),
            config::ytdlp::RETRIES.to_string(),
            "-o".to_string(),
            output_template.display().to_string(),
            request.url.clone(),
        ]
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn lookup(&self, url: &str) -> Result<VideoInfo, AppError> {
        let socket_timeout = config::ytdlp::SOCKET_TIMEOUT_SECS.to_string();
        let retries = config::ytdlp::RETRIES.to_string();

        let mut cmd = TokioCommand::new(&self.ytdl_bin);
        cmd.args([
            "-J",
            "--no-playlist",
            "--no-warnings",
            "--user-agent",
            config::ytdlp::USER_AGENT,
            "--socket-timeout",
            socket_timeout.as_str(),
            "--retries",
            retries.as_str(),
            url,
        ]);

        log::debug!("Looking up {} with {}", url, self.ytdl_bin);
        let output = run_with_timeout(&mut cmd, config::ytdlp::lookup_timeout())
            .await
            .map_err(|e| AppError::Extraction(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Extraction(summarize_stderr(&stderr)));
        }

        let info = parse_video_info(&output.stdout)?;
        log::info!("Found {} formats for '{}'", info.formats.len(), info.title);
        Ok(info)
    }

    async fn check_tools(&self) -> Result<(), AppError> {
        probe_tool(&self.ffmpeg_bin, "-version", config::tools::probe_timeout()).await
    }

    fn fetch(&self, request: &FetchRequest, on_progress: &mut dyn FnMut(RawProgress)) -> Result<FetchedMedia, AppError> {
        let args = self.download_args(request);
        log::debug!("yt-dlp command: {} {}", self.ytdl_bin, args.join(" "));

        let mut child = Command::new(&self.ytdl_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AppError::Transfer(format!("Failed to start {}: {}", self.ytdl_bin, e)))?;

        // Both streams are drained on their own threads; the lines are consumed
        // here so the progress callback always runs on the calling thread.
        let (line_tx, line_rx) = mpsc::channel::<OutputLine>();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_line_reader(stdout, line_tx.clone(), OutputLine::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_line_reader(stderr, line_tx.clone(), OutputLine::Stderr));
        }
        drop(line_tx);

        let mut target: Option<String> = None;
        let mut stderr_tail: VecDeque<String> = VecDeque::new();

        for line in line_rx {
            let text = match line {
                OutputLine::Stdout(text) => {
                    log::trace!("yt-dlp stdout: {}", text);
                    text
                }
                OutputLine::Stderr(text) => {
                    log::trace!("yt-dlp stderr: {}", text);
                    stderr_tail.push_back(text.clone());
                    if stderr_tail.len() > STDERR_TAIL {
                        stderr_tail.pop_front();
                    }
                    text
                }
            };

            if let Some(filename) = text.trim().strip_prefix(INFO_PREFIX) {
                target = Some(filename.trim().to_string());
                continue;
            }
            if let Some(progress) = parse_progress_line(&text) {
                on_progress(progress);
            }
        }

        for reader in readers {
            if reader.join().is_err() {
                log::warn!("yt-dlp output reader thread panicked");
            }
        }

        let status = child.wait().map_err(AppError::Io)?;
        if !status.success() {
            let stderr = stderr_tail.make_contiguous().join("\n");
            return Err(AppError::Transfer(summarize_stderr(&stderr)));
        }

        let target = target.ok_or_else(|| AppError::Transfer("yt-dlp did not report an output file".to_string()))?;
        media_from_path(Path::new(&target))
            .ok_or_else(|| AppError::Transfer(format!("Unexpected output file name: {}", target)))
    }
}

enum OutputLine {
    Stdout(String),
    Stderr(String),
}

fn spawn_line_reader<R>(
    stream: R,
    tx: mpsc::Sender<OutputLine>,
    wrap: fn(String) -> OutputLine,
) -> std::thread::JoinHandle<()>
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines().map_while(Result::ok) {
            if tx.send(wrap(line)).is_err() {
                break;
            }
        }
    })
}

fn media_from_path(path: &Path) -> Option<FetchedMedia> {
    let stem = path.file_stem()?.to_string_lossy().to_string();
    let ext = path.extension()?.to_string_lossy().to_string();
    Some(FetchedMedia { stem, ext })
}

/// Translates the user's format selector into a yt-dlp `--format` value.
///
/// A composite `v+a` selector keeps the video id and lets yt-dlp pick the best
/// audio track at download time.
///
/// # Example
///
/// ```
/// use vidfetch::download::ytdlp::build_format_arg;
///
/// assert_eq!(build_format_arg("137+140"), "137+bestaudio");
/// assert_eq!(build_format_arg("18"), "18");
/// ```
pub fn build_format_arg(selector: &str) -> String {
    match selector.split_once('+') {
        Some((video, _)) => format!("{}+bestaudio", video),
        None => selector.to_string(),
    }
}

/// Parses a single line of yt-dlp output into a progress notification.
///
/// Recognises lines rendered by our progress template and the banners of the
/// merge/convert post-processors. Everything else yields `None`.
pub fn parse_progress_line(line: &str) -> Option<RawProgress> {
    let line = line.trim();

    if POSTPROCESSOR_PREFIXES.iter().any(|p| line.starts_with(p)) {
        return Some(RawProgress::Finished { filename: None });
    }

    let rest = line.strip_prefix(PROGRESS_PREFIX)?;
    let fields: Vec<&str> = rest.split('\t').collect();
    if fields.len() < 7 {
        log::trace!("Malformed progress line: {}", line);
        return None;
    }

    let filename = field(fields[6]).map(|f| f.to_string());
    match fields[0] {
        "downloading" => {
            let downloaded = parse_number(fields[1]).map(|n| n as u64).unwrap_or(0);
            let total = parse_number(fields[2]).or_else(|| parse_number(fields[3])).map(|n| n as u64);
            Some(RawProgress::Downloading {
                downloaded,
                total,
                speed: parse_number(fields[4]),
                eta: parse_number(fields[5]).map(|n| n as u64),
                filename,
            })
        }
        "finished" => Some(RawProgress::Finished { filename }),
        _ => None,
    }
}

/// yt-dlp renders missing template values as `NA`.
fn field(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "NA" || raw == "None" {
        None
    } else {
        Some(raw)
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    field(raw)?.parse::<f64>().ok().filter(|n| n.is_finite() && *n >= 0.0)
}

/// Picks the most useful message out of yt-dlp's stderr.
fn summarize_stderr(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if let Some(error) = lines.iter().rev().find(|l| l.starts_with("ERROR:")) {
        return error.trim_start_matches("ERROR:").trim().to_string();
    }
    match lines.last() {
        Some(last) => last.to_string(),
        None => "yt-dlp exited without output".to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct RawVideoInfo {
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    description: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: String,
    ext: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    width: Option<f64>,
    height: Option<f64>,
    fps: Option<f64>,
    tbr: Option<f64>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
    format_note: Option<String>,
}

/// yt-dlp spells a missing codec as `"none"`.
fn codec(raw: Option<String>) -> Option<String> {
    raw.filter(|c| !c.is_empty() && c != "none")
}

impl From<RawFormat> for FormatDescriptor {
    fn from(raw: RawFormat) -> Self {
        let size = raw.filesize.or(raw.filesize_approx).filter(|s| *s > 0.0).map(|s| s as u64);
        FormatDescriptor {
            format_id: raw.format_id,
            container: raw.ext.unwrap_or_else(|| "N/A".to_string()),
            video_codec: codec(raw.vcodec),
            audio_codec: codec(raw.acodec),
            width: raw.width.map(|w| w as u32),
            height: raw.height.map(|h| h as u32),
            fps: raw.fps,
            bitrate: raw.tbr,
            approx_size_bytes: size,
            note: raw.format_note,
        }
    }
}

/// Parses the JSON printed by `yt-dlp -J`.
pub fn parse_video_info(json: &[u8]) -> Result<VideoInfo, AppError> {
    let raw: RawVideoInfo =
        serde_json::from_slice(json).map_err(|e| AppError::Extraction(format!("Invalid yt-dlp output: {}", e)))?;

    if raw.formats.is_empty() {
        return Err(AppError::Extraction("No video information found".to_string()));
    }

    Ok(VideoInfo {
        title: raw.title.unwrap_or_else(|| "Unknown Title".to_string()),
        duration_seconds: raw.duration.filter(|d| *d >= 0.0).map(|d| d as u64),
        thumbnail: raw.thumbnail,
        description: raw.description,
        formats: raw.formats.into_iter().map(FormatDescriptor::from).collect(),
    })
}
