//! Common test utilities
//!
//! This module is shared across all integration tests

pub mod app;
pub mod stub_fetcher;

#[allow(unused_imports)]
pub use app::{events_until_terminal, next_event, statuses, TestApp};
#[allow(unused_imports)]
pub use stub_fetcher::{finished, progress, sample_info, Latch, Output, Step, StubFetcher};
