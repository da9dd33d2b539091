//! vidfetch - local web front-end for downloading videos with live progress
//!
//! A user pastes a video URL, inspects the available formats and downloads
//! one of them to disk while progress is pushed over a WebSocket. Extraction
//! and muxing are delegated to `yt-dlp` and `ffmpeg`.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, logging, metrics and process helpers
//! - `download`: Download sessions, progress fan-out, workers and the yt-dlp backend
//! - `web`: HTTP and WebSocket endpoints
//! - `desktop`: Folder opener and native folder picker
//! - `cli`: Command-line interface

pub mod cli;
pub mod core;
pub mod desktop;
pub mod download;
pub mod web;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use download::{ProgressBus, ProgressEvent, SessionRegistry, WorkerPool};
pub use web::{create_router, WebState};
