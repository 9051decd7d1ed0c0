//! Syndication-feed sources fetched over plain HTTP
//!
//! Feed enumeration is shared with rendered sources: both list their
//! candidates from RSS/Atom documents.

use super::{Candidate, CandidateError, Extraction};
use crate::config::{FeedSourceConfig, NetworkConfig};
use crate::crawler::{compile_selector, select_text, FetchOptions, ResilientFetcher};
use crate::url::{canonicalize_url, resolve_link};
use crate::{ConfigError, CrawlError};
use feed_rs::model::Link;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug)]
pub struct FeedAdapter {
    id: String,
    feeds: FeedList,
    content: Selector,
    strip: Option<Selector>,
    polite: bool,
    article_timeout: Duration,
    pause_after: Option<[f64; 2]>,
}

impl FeedAdapter {
    pub fn from_config(config: &FeedSourceConfig, network: &NetworkConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            id: config.id.clone(),
            feeds: FeedList::new(&config.id, &config.feeds, &config.exclude, network)?,
            content: compile_selector(&config.content_selector)?,
            strip: config.strip_selector.as_deref().map(compile_selector).transpose()?,
            polite: config.polite,
            article_timeout: network.article_timeout(),
            pause_after: config.pause_after,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pause_after(&self) -> Option<[f64; 2]> {
        self.pause_after
    }

    pub async fn enumerate(&self, fetcher: &ResilientFetcher) -> Result<Vec<Candidate>, CrawlError> {
        self.feeds.enumerate(fetcher, self.polite).await
    }

    pub async fn extract(
        &self,
        candidate: &Candidate,
        fetcher: &ResilientFetcher,
    ) -> Result<Extraction, CandidateError> {
        let options = FetchOptions::new(self.article_timeout).polite(self.polite);
        let document = fetcher.fetch(&candidate.url, options).await?;
        Ok(self.extract_document(candidate, &document.text()))
    }

    /// Locates the content container in an article page
    pub fn extract_document(&self, candidate: &Candidate, document: &str) -> Extraction {
        let html = Html::parse_document(document);
        match select_text(&html, &self.content, self.strip.as_ref()) {
            Some(body) => Extraction::checked(&candidate.title, body, candidate.archive_date(), document),
            None => {
                tracing::warn!(source = %self.id, url = %candidate.url, "Content container not found");
                Extraction::no_content(document)
            }
        }
    }
}

/// A set of feed URLs plus the links that must never become candidates
#[derive(Debug)]
pub(crate) struct FeedList {
    source_id: String,
    feeds: Vec<String>,
    exclude: HashSet<String>,
    timeout: Duration,
}

impl FeedList {
    pub(crate) fn new(
        source_id: &str,
        feeds: &[String],
        exclude: &[String],
        network: &NetworkConfig,
    ) -> Result<Self, ConfigError> {
        let exclude = exclude
            .iter()
            .map(|url| canonicalize_url(url).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", url, e))))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            source_id: source_id.to_string(),
            feeds: feeds.to_vec(),
            exclude,
            timeout: network.listing_timeout(),
        })
    }

    /// Reads every feed in order
    ///
    /// A feed that fails is logged and skipped; only when every feed failed
    /// is the last error returned and the source abandoned.
    pub(crate) async fn enumerate(
        &self,
        fetcher: &ResilientFetcher,
        polite: bool,
    ) -> Result<Vec<Candidate>, CrawlError> {
        let options = FetchOptions::new(self.timeout).polite(polite);
        let mut candidates = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0usize;

        for feed_url in &self.feeds {
            let result = match fetcher.fetch(feed_url, options).await {
                Ok(document) => self.parse_feed(&document.url, &document.body),
                Err(e) => Err(CrawlError::from(e)),
            };

            match result {
                Ok(found) => {
                    tracing::debug!(source = %self.source_id, feed = %feed_url, entries = found.len(), "Feed read");
                    succeeded += 1;
                    candidates.extend(found);
                }
                Err(e) => {
                    tracing::error!(source = %self.source_id, feed = %feed_url, error = %e, "Failed to read feed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(candidates),
        }
    }

    /// Turns one feed document into candidates
    pub(crate) fn parse_feed(&self, feed_url: &str, body: &[u8]) -> Result<Vec<Candidate>, CrawlError> {
        let feed = feed_rs::parser::parse(body).map_err(|e| CrawlError::FeedParse {
            url: feed_url.to_string(),
            message: e.to_string(),
        })?;

        let mut candidates = Vec::new();
        for entry in feed.entries {
            let href = article_link(&entry.links)
                .or_else(|| Some(entry.id.clone()).filter(|id| id.starts_with("http")));
            let Some(href) = href else {
                tracing::debug!(source = %self.source_id, entry = %entry.id, "Feed entry without link");
                continue;
            };

            let url = match resolve_link(feed_url, &href) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!(source = %self.source_id, %href, error = %e, "Unusable feed link");
                    continue;
                }
            };
            if self.exclude.contains(&url) {
                tracing::debug!(source = %self.source_id, %url, "Excluded feed link");
                continue;
            }

            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| url.clone());

            candidates.push(Candidate {
                source_id: self.source_id.clone(),
                url,
                title,
                published_at: entry.published.or(entry.updated),
            });
        }

        Ok(candidates)
    }
}

/// Picks the entry's article link: the first `alternate` (or rel-less)
/// link, else whatever link comes first
fn article_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|link| link.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| links.first())
        .map(|link| link.href.clone())
}
