//! Source adapters: where candidates come from and how article text is
//! located in each source's documents
//!
//! The set of adapters is closed. Each configured `[[source]]` becomes one
//! [`SourceAdapter`] variant at startup.

mod feed;
mod list_page;
mod rendered;

pub use feed::FeedAdapter;
pub use list_page::ListPageAdapter;
pub use rendered::RenderedAdapter;

use crate::config::{Config, SourceConfig};
use crate::crawler::ResilientFetcher;
use crate::render::{RenderBackend, RenderError};
use crate::state::AbsentReason;
use crate::{ConfigError, CrawlError, FetchError};
use chrono::{DateTime, Local, NaiveDate, Utc};
use std::collections::HashSet;
use thiserror::Error;

/// A link proposed by a source's enumeration
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub source_id: String,
    /// Canonical URL; also the ledger key
    pub url: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl Candidate {
    /// Archive date: the UTC date of the feed timestamp, else today
    pub fn archive_date(&self) -> NaiveDate {
        self.published_at
            .map(|at| at.date_naive())
            .unwrap_or_else(|| Local::now().date_naive())
    }
}

/// Article text ready to be archived
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedArticle {
    pub title: String,
    pub body: String,
    pub published_on: NaiveDate,
}

/// Result of running a source's extractor on one candidate
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Article(ExtractedArticle),

    /// Not an article; `document` is the raw page it was decided on
    Absent {
        reason: AbsentReason,
        document: String,
    },
}

impl Extraction {
    /// Applies the validity rule shared by every source: a body that is
    /// empty after trimming is absent content, not an article
    pub fn checked(title: &str, body: String, published_on: NaiveDate, document: &str) -> Self {
        if body.trim().is_empty() {
            return Self::Absent {
                reason: AbsentReason::Empty,
                document: document.to_string(),
            };
        }
        Self::Article(ExtractedArticle {
            title: title.to_string(),
            body,
            published_on,
        })
    }

    pub fn no_content(document: &str) -> Self {
        Self::Absent {
            reason: AbsentReason::NoContent,
            document: document.to_string(),
        }
    }

    pub fn absent_reason(&self) -> Option<AbsentReason> {
        match self {
            Self::Article(_) => None,
            Self::Absent { reason, .. } => Some(*reason),
        }
    }
}

/// Per-candidate failures; none of them abort the source
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Unexpected failure while driving the renderer
    #[error("{error}")]
    Render {
        error: RenderError,
        /// Whatever DOM could still be read, for diagnosis
        document: Option<String>,
    },
}

/// One configured source
#[derive(Debug)]
pub enum SourceAdapter {
    Feed(FeedAdapter),
    ListPage(ListPageAdapter),
    Rendered(RenderedAdapter),
}

impl SourceAdapter {
    /// Builds the adapter for `source`, compiling its selectors
    pub fn from_config(source: &SourceConfig, config: &Config) -> Result<Self, ConfigError> {
        Ok(match source {
            SourceConfig::Feed(s) => Self::Feed(FeedAdapter::from_config(s, &config.network)?),
            SourceConfig::ListPage(s) => {
                Self::ListPage(ListPageAdapter::from_config(s, &config.network)?)
            }
            SourceConfig::Rendered(s) => Self::Rendered(RenderedAdapter::from_config(
                s,
                &config.network,
                &config.renderer,
            )?),
        })
    }

    /// Builds adapters for every configured source, in configured order
    pub fn all_from_config(config: &Config) -> Result<Vec<Self>, ConfigError> {
        config
            .sources
            .iter()
            .map(|source| Self::from_config(source, config))
            .collect()
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Feed(a) => a.id(),
            Self::ListPage(a) => a.id(),
            Self::Rendered(a) => a.id(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Feed(_) => "feed",
            Self::ListPage(_) => "list-page",
            Self::Rendered(_) => "rendered",
        }
    }

    /// True if candidates can only be extracted through a rendering session
    pub fn needs_renderer(&self) -> bool {
        matches!(self, Self::Rendered(_))
    }

    /// Randomized pause range (seconds) after each processed candidate
    pub fn pause_after(&self) -> Option<[f64; 2]> {
        match self {
            Self::Feed(a) => a.pause_after(),
            Self::ListPage(a) => a.pause_after(),
            Self::Rendered(a) => a.pause_after(),
        }
    }

    /// Lists this cycle's candidates, canonical and without duplicates
    pub async fn enumerate(&self, fetcher: &ResilientFetcher) -> Result<Vec<Candidate>, CrawlError> {
        let candidates = match self {
            Self::Feed(a) => a.enumerate(fetcher).await?,
            Self::ListPage(a) => a.enumerate(fetcher).await?,
            Self::Rendered(a) => a.enumerate(fetcher).await?,
        };
        Ok(dedup_candidates(candidates))
    }

    /// Fetches and extracts one candidate
    ///
    /// `session` is only consulted by rendered sources.
    pub async fn extract<B>(
        &self,
        candidate: &Candidate,
        fetcher: &ResilientFetcher,
        session: Option<&mut B>,
    ) -> Result<Extraction, CandidateError>
    where
        B: RenderBackend + ?Sized,
    {
        match self {
            Self::Feed(a) => a.extract(candidate, fetcher).await,
            Self::ListPage(a) => a.extract(candidate, fetcher).await,
            Self::Rendered(a) => match session {
                Some(session) => a.extract(candidate, session, fetcher.pacer()).await,
                None => Err(CandidateError::Render {
                    error: RenderError::Closed,
                    document: None,
                }),
            },
        }
    }
}

/// Keeps the first occurrence of every URL
fn dedup_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.url.clone()))
        .collect()
}
