//! Press-Harvest: an incremental content-ingestion crawler
//!
//! This crate polls a fixed set of content sources (syndication feeds, a
//! monthly digest listing, a page that needs a real browser to render),
//! extracts article text and appends every newly seen article to a
//! per-source, per-day text archive. A durable ledger of seen URLs makes
//! each cycle incremental.

pub mod config;
pub mod crawler;
pub mod output;
pub mod render;
pub mod sources;
pub mod state;
pub mod storage;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Press-Harvest operations
///
/// Only the catastrophic cases end up here at cycle level; per-candidate
/// and per-source failures are logged and absorbed by the coordinator.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] storage::LedgerError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Feed parse error for {url}: {message}")]
    FeedParse { url: String, message: String },

    #[error("Archive write failed for {path:?}: {source}")]
    Archive {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector in config: {0}")]
    InvalidSelector(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Errors surfaced by the resilient fetcher
///
/// `Status` is terminal and returned on the first attempt; everything
/// transient is retried and finally reported as `RetriesExhausted`.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Retries exhausted for {url} after {attempts} attempts (last: {last})")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: String,
    },
}

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, ResilientFetcher};
pub use sources::{Candidate, ExtractedArticle, Extraction};
pub use state::{AbsentReason, CandidateOutcome};
pub use storage::DedupLedger;
pub use url::canonicalize_url;
