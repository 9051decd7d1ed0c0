//! Monthly digest listing scanned for entry blocks
//!
//! The listing for the current month lives at `<list-url>/<YYYY>/<MM>`.
//! Each entry block must carry a link with a non-empty `href` and a title;
//! blocks missing either are skipped.

use super::{Candidate, CandidateError, Extraction};
use crate::config::{ListPageSourceConfig, NetworkConfig};
use crate::crawler::{compile_selector, element_text, parse_time_marker, FetchOptions, ResilientFetcher};
use crate::url::resolve_link;
use crate::{ConfigError, CrawlError};
use chrono::{Local, NaiveDate};
use scraper::{Html, Selector};
use std::time::Duration;

#[derive(Debug)]
pub struct ListPageAdapter {
    id: String,
    list_url: String,
    entry: Selector,
    link: Selector,
    title: Selector,
    content: Selector,
    time_marker: Selector,
    polite: bool,
    listing_timeout: Duration,
    article_timeout: Duration,
    pause_after: Option<[f64; 2]>,
}

impl ListPageAdapter {
    pub fn from_config(config: &ListPageSourceConfig, network: &NetworkConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            id: config.id.clone(),
            list_url: config.list_url.trim_end_matches('/').to_string(),
            entry: compile_selector(&config.entry_selector)?,
            link: compile_selector(&config.link_selector)?,
            title: compile_selector(&config.title_selector)?,
            content: compile_selector(&config.content_selector)?,
            time_marker: compile_selector("time[datetime]")?,
            polite: config.polite,
            listing_timeout: network.listing_timeout(),
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

    /// Listing URL for the month containing `date`
    pub fn listing_url_for(&self, date: NaiveDate) -> String {
        format!("{}/{}", self.list_url, date.format("%Y/%m"))
    }

    pub async fn enumerate(&self, fetcher: &ResilientFetcher) -> Result<Vec<Candidate>, CrawlError> {
        let listing_url = self.listing_url_for(Local::now().date_naive());
        tracing::info!(source = %self.id, url = %listing_url, "Reading listing");

        let options = FetchOptions::new(self.listing_timeout).polite(self.polite);
        let document = fetcher.fetch(&listing_url, options).await?;
        Ok(self.parse_listing(&document.url, &document.text()))
    }

    /// Extracts candidates from a listing document
    pub fn parse_listing(&self, base_url: &str, body: &str) -> Vec<Candidate> {
        let html = Html::parse_document(body);
        let mut candidates = Vec::new();

        for block in html.select(&self.entry) {
            let href = block
                .select(&self.link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::trim)
                .filter(|href| !href.is_empty());
            let title = block
                .select(&self.title)
                .next()
                .map(|t| element_text(t, None).replace('\n', ""))
                .filter(|t| !t.is_empty());

            let (Some(href), Some(title)) = (href, title) else {
                tracing::debug!(source = %self.id, "Skipping entry block without link or title");
                continue;
            };

            match resolve_link(base_url, href) {
                Ok(url) => candidates.push(Candidate {
                    source_id: self.id.clone(),
                    url,
                    title,
                    published_at: None,
                }),
                Err(e) => {
                    tracing::debug!(source = %self.id, %href, error = %e, "Unusable entry link");
                }
            }
        }

        candidates
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

    /// Locates the entry body and publication date in an article page
    pub fn extract_document(&self, candidate: &Candidate, document: &str) -> Extraction {
        let html = Html::parse_document(document);

        let Some(container) = html.select(&self.content).next() else {
            tracing::warn!(source = %self.id, url = %candidate.url, "Content container not found");
            return Extraction::no_content(document);
        };
        let body = element_text(container, None);

        let published_on = html
            .select(&self.time_marker)
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .and_then(parse_time_marker)
            .unwrap_or_else(|| Local::now().date_naive());

        Extraction::checked(&candidate.title, body, published_on, document)
    }
}
