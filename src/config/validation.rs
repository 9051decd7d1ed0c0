use crate::config::types::{
    Config, CrawlerConfig, FeedSourceConfig, ListPageSourceConfig, NetworkConfig, OutputConfig,
    RenderedSourceConfig, RendererConfig, RetryConfig, SourceConfig,
};
use crate::render::Locator;
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    validate_network_config(&config.network)?;
    validate_retry_config(&config.retry)?;
    validate_renderer_config(&config.renderer)?;
    validate_sources(&config.sources)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.cycle_interval_minutes < 1 {
        return Err(ConfigError::Validation(
            "cycle-interval-minutes must be >= 1".to_string(),
        ));
    }

    if config.retention_days < 1 {
        return Err(ConfigError::Validation(
            "retention-days must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("ledger-path", &config.ledger_path),
        ("data-dir", &config.data_dir),
        ("debug-dir", &config.debug_dir),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }
    Ok(())
}

fn validate_network_config(config: &NetworkConfig) -> Result<(), ConfigError> {
    if let Some(proxy) = config.proxy_url() {
        Url::parse(&proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.listing_timeout_secs == 0 || config.article_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request timeouts must be >= 1 second".to_string(),
        ));
    }

    Ok(())
}

/// Upper bound for `max-retries`
const MAX_RETRIES_LIMIT: u32 = 20;

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 || config.max_retries > MAX_RETRIES_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max-retries must be between 1 and {}, got {}",
            MAX_RETRIES_LIMIT, config.max_retries
        )));
    }

    let delays_valid = [config.min_delay, config.max_delay, config.jitter_max]
        .iter()
        .all(|d| d.is_finite() && *d >= 0.0);
    if !delays_valid {
        return Err(ConfigError::Validation(
            "min-delay, max-delay and jitter-max must be finite and >= 0".to_string(),
        ));
    }

    if config.min_delay > config.max_delay {
        return Err(ConfigError::Validation(format!(
            "min-delay ({}) must not exceed max-delay ({})",
            config.min_delay, config.max_delay
        )));
    }

    if !config.backoff_factor.is_finite() || config.backoff_factor < 1.0 {
        return Err(ConfigError::Validation(format!(
            "backoff-factor must be >= 1.0, got {}",
            config.backoff_factor
        )));
    }

    Ok(())
}

fn validate_renderer_config(config: &RendererConfig) -> Result<(), ConfigError> {
    if config.window_dimensions().is_none() {
        return Err(ConfigError::Validation(format!(
            "window-size must be \"WIDTH,HEIGHT\", got '{}'",
            config.window_size
        )));
    }

    if let Some(path) = &config.chrome_executable {
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "chrome-executable cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates source entries: unique, path-safe ids and well-formed URLs
/// and selectors
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    if sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[source]] must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for source in sources {
        validate_source_id(source.id())?;
        if !seen.insert(source.id()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source id '{}'",
                source.id()
            )));
        }

        if let Some([low, high]) = source.pause_after() {
            if !(low.is_finite() && high.is_finite() && low >= 0.0 && low <= high) {
                return Err(ConfigError::Validation(format!(
                    "pause-after of '{}' must be [min, max] with 0 <= min <= max",
                    source.id()
                )));
            }
        }

        match source {
            SourceConfig::Feed(feed) => validate_feed_source(feed)?,
            SourceConfig::ListPage(list) => validate_list_page_source(list)?,
            SourceConfig::Rendered(rendered) => validate_rendered_source(rendered)?,
        }
    }

    Ok(())
}

/// Source ids name archive directories and files, so they must be path-safe
fn validate_source_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() {
        return Err(ConfigError::Validation(
            "source id cannot be empty".to_string(),
        ));
    }

    if !id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "source id must contain only alphanumeric characters, hyphens and underscores, got '{}'",
            id
        )));
    }

    Ok(())
}

fn validate_feed_source(source: &FeedSourceConfig) -> Result<(), ConfigError> {
    validate_feed_urls(&source.id, &source.feeds)?;
    validate_urls(&source.exclude)?;
    validate_selector(&source.content_selector)?;
    if let Some(strip) = &source.strip_selector {
        validate_selector(strip)?;
    }
    Ok(())
}

fn validate_list_page_source(source: &ListPageSourceConfig) -> Result<(), ConfigError> {
    validate_urls(std::slice::from_ref(&source.list_url))?;
    for selector in [
        &source.entry_selector,
        &source.link_selector,
        &source.title_selector,
        &source.content_selector,
    ] {
        validate_selector(selector)?;
    }
    Ok(())
}

fn validate_rendered_source(source: &RenderedSourceConfig) -> Result<(), ConfigError> {
    validate_feed_urls(&source.id, &source.feeds)?;
    validate_urls(&source.exclude)?;
    validate_selector(&source.content_selector)?;
    match &source.dismiss {
        Some(Locator::Css(css)) => validate_selector(css)?,
        Some(Locator::Xpath(xpath)) if xpath.trim().is_empty() => {
            return Err(ConfigError::Validation(format!(
                "dismiss xpath of '{}' cannot be empty",
                source.id
            )));
        }
        _ => {}
    }
    Ok(())
}

fn validate_feed_urls(id: &str, feeds: &[String]) -> Result<(), ConfigError> {
    if feeds.is_empty() {
        return Err(ConfigError::Validation(format!(
            "source '{}' must have at least one feed URL",
            id
        )));
    }
    validate_urls(feeds)
}

fn validate_urls(urls: &[String]) -> Result<(), ConfigError> {
    for raw in urls {
        let url = Url::parse(raw)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid URL '{}': {}", raw, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "URL '{}' must use http or https",
                raw
            )));
        }
    }
    Ok(())
}

fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}
