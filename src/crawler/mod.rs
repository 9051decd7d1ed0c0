//! Crawler module for fetching and processing content sources
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry, backoff and politeness delays
//! - Charset detection for fetched documents
//! - HTML helpers for locating article text
//! - Cycle scheduling and the pacing seam
//! - Overall cycle coordination

mod coordinator;
mod decode;
mod fetcher;
mod parser;
mod scheduler;

pub use coordinator::Coordinator;
pub use decode::{decode_html, detect_encoding};
pub use fetcher::{
    build_http_client, Document, FetchOptions, ResilientFetcher, RetryPolicy, MAX_WAIT,
};
pub use parser::{compile_selector, element_text, parse_time_marker, select_text};
pub use scheduler::{CycleScheduler, Pacer, TokioPacer};
