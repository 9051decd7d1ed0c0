//! Configuration module for Press-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use press_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawler.toml")).unwrap();
//! println!("Cycle every {} minutes", config.crawler.cycle_interval_minutes);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, FeedSourceConfig, ListPageSourceConfig, NetworkConfig, OutputConfig,
    RenderedSourceConfig, RendererConfig, RetryConfig, SourceConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
